// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

pub mod attrs;
pub mod index_map;
pub mod span;
