// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The kernel IR and the passes that lower it toward a form a simple backend can execute.

pub mod builder;
pub mod conversion;
pub mod fold;
pub mod kir;
pub mod passes;
pub mod utils;
