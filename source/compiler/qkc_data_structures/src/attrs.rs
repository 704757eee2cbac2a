// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use bitflags::bitflags;
use std::fmt::{self, Display, Formatter};

bitflags! {
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    /// Kernel function attributes attached by analysis passes.
    pub struct Attributes: u32 {
        const EntryPoint          = 0b_0001;
        /// A measurement result steers later control flow, so the kernel cannot be
        /// sampled as a single batch of shots.
        const MeasurementFeedback = 0b_0010;
    }
}

impl Display for Attributes {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut names = self.iter_names().map(|(name, _)| name);
        if let Some(first) = names.next() {
            write!(f, "{first}")?;
            for name in names {
                write!(f, " | {name}")?;
            }
        }
        Ok(())
    }
}
