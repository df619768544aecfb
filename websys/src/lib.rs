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

#![warn(missing_docs, clippy::needless_borrow)]
// Clippy lints, some should be disabled incrementally
#![allow(
    clippy::new_without_default,
    clippy::upper_case_acronyms,
    clippy::comparison_to_empty
)]

//! Websys turns a declarative JSON specification of a multi-branch web/API
//! service into a fully resolved, dependency-ordered plan of cloud resources
//! (functions, queues, gateways, topics, front-end apps and batch jobs).
//!
//! The data flow is
//!
//! ```text
//! raw spec text -> template -> schema -> builder (naming + reference) -> plan -> sink
//! ```

pub mod aws;
pub mod builder;
pub mod configs;
pub mod error;
pub mod naming;
pub mod openapi;
pub mod plan;
pub mod policy;
pub mod prelude;
pub mod reference;
pub mod schema;
pub mod spec;
pub mod synth;
pub mod template;

#[cfg(test)]
mod tests;
