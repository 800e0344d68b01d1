// Copyright 2025 Querex Contributors
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

//! Storage collaborators
//!
//! - [`Context`] - What an expression needs from a store
//! - [`MemoryStore`] - An in-memory implementation

pub mod context;
pub mod memory;

pub use context::{ColumnRef, Context, ObjectRef, StatusResult, TableRef};
pub use memory::MemoryStore;
