// Copyright (c) 2020-present, UMD Database Group.
//
// This program is free software: you can use, redistribute, and/or modify
// it under the terms of the GNU Affero General Public License, version 3
// or later ("AGPL"), as published by the Free Software Foundation.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or
// FITNESS FOR A PARTICULAR PURPOSE.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <http://www.gnu.org/licenses/>.

//! A "prelude" for users of the websys crate.
//!
//! Like the standard library's prelude, this module simplifies importing of
//! common items. Unlike the standard prelude, the contents of this module must
//! be imported manually:
//!
//! ```
//! use websys::prelude::*;
//! ```

pub use crate::aws::lambda::{AwsLayerVersionLookup, LayerVersionLookup};
pub use crate::builder::{BuildOutput, GraphBuilder};
pub use crate::configs::*;
pub use crate::error::{Result, WebSysError};
pub use crate::naming::{DeployEnv, NameSolver};
pub use crate::plan::{
    Category, Handle, JsonSink, LogSink, MemorySink, Phase, Plan, ProvisioningSink, ResourceIntent,
};
pub use crate::policy::PolicyFragment;
pub use crate::reference::{HandleStore, ReferenceSolver, Scope, StoreEvent, StoreKey, StoreKind};
pub use crate::schema::{default_schema, validate};
pub use crate::spec::ServiceSpec;
pub use crate::synth::{prepare, synthesize, SynthOptions};
pub use crate::template::{substitute, Placeholder, Substitutions};
