// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

pub mod add_metadata;
pub mod expand_measurements;
pub mod type_check;

#[cfg(test)]
mod tests;

use crate::{
    conversion::Error,
    kir::{Function, Module},
};
use add_metadata::add_metadata;
use expand_measurements::{ExpandMeasurementsConfig, expand_measurements};
use log::debug;
use rayon::prelude::*;
use serde::Deserialize;
use type_check::check_types;

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct PipelineConfig {
    /// Process the functions of a module on the rayon thread pool.
    pub parallel: bool,
    pub expand_measurements: ExpandMeasurementsConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            expand_measurements: ExpandMeasurementsConfig::default(),
        }
    }
}

/// Runs the measurement lowering pipeline over every function in the module.
///
/// Functions are independent: a function that fails keeps its original body and the errors of
/// all failing functions are returned together, in function order.
pub fn run_pipeline(module: &mut Module, config: &PipelineConfig) -> Result<(), Vec<Error>> {
    debug!(
        "running pipeline over {} functions",
        module.functions.values().count()
    );
    let errors = for_each_function(module, config.parallel, |function| {
        run_function_pipeline(function, config)
    });
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Runs the pipeline over a single function. On failure the function is left unchanged.
pub fn run_function_pipeline(
    function: &mut Function,
    config: &PipelineConfig,
) -> Result<(), Error> {
    let attrs = function.attrs;
    add_metadata(function);
    if let Err(err) = expand_measurements(function, &config.expand_measurements) {
        function.attrs = attrs;
        return Err(err);
    }
    check_types(function);
    Ok(())
}

fn for_each_function(
    module: &mut Module,
    parallel: bool,
    pass: impl Fn(&mut Function) -> Result<(), Error> + Sync,
) -> Vec<Error> {
    let functions: Vec<&mut Function> = module.functions.values_mut().collect();
    if parallel {
        functions
            .into_par_iter()
            .filter_map(|function| pass(function).err())
            .collect()
    } else {
        functions
            .into_iter()
            .filter_map(|function| pass(function).err())
            .collect()
    }
}
