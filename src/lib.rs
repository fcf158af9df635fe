// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![deny(missing_docs)]
#![allow(dead_code)]

//! # iidpatch
//!
//! A build-time bytecode patcher for modules that use a WinRT-style interop
//! layer. At runtime that layer computes a 128-bit interface identifier
//! (IID) per type by building a textual signature of the type's structure
//! and hashing it - on every lookup, which is costly for deeply nested
//! generic types. `iidpatch` finds the exact call sequence that triggers
//! the computation inside already-compiled method bodies and replaces it
//! with a direct load of a precomputed 16-byte blob, preserving observable
//! behavior while eliminating the repeated runtime cost.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use iidpatch::prelude::*;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let module = Arc::new(Module::from_file(Path::new("App.iidm"))?);
//! let resolver = FolderResolver::for_directory(Path::new("."));
//! let patcher = GuidPatcher::new(module, &resolver);
//! let patched = patcher.process()?;
//! println!("{patched} IID calculations/fetches patched");
//! patcher.save(Path::new("output"))?;
//! # Ok::<(), iidpatch::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`metadata`] - the module object model: tables, members, attributes,
//!   the container codec, and peer-module resolution
//! - [`assembly`] - the instruction model for method bodies
//! - [`signature`] - signature trees, their generation from type structure,
//!   rendering, and IID hashing
//! - [`patcher`] - the pattern matcher, the metadata synthesizer and the
//!   patch orchestrator
//!
//! Patching is a single-threaded, single-pass operation per module; every
//! rewrite replaces an instruction span with the same number of
//! instructions, so branch targets and handler offsets stay valid without
//! adjustment.

#[macro_use]
pub(crate) mod macros;

#[macro_use]
pub(crate) mod error;

pub mod assembly;
pub mod file;
pub mod metadata;
pub mod patcher;
pub mod prelude;
pub mod signature;

/// The result type used throughout iidpatch.
pub type Result<T> = std::result::Result<T, Error>;

pub use error::Error;
pub use file::{parser::Parser, File};
pub use metadata::module::Module;
pub use patcher::GuidPatcher;
