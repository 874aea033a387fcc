//! This module contains common utilities for simplifying the writing of
//! integration tests for this library.

#![cfg(test)]

use std::{fs::File, io::Read};

use anyhow::anyhow;
use rand::Rng;
use storage_layout_planner::{
    layout::{FieldDeclaration, Planner, StorageLayout, TypeDescriptor},
    plan,
};

/// Reads the declarations in the JSON file `tests/data/{name}.json`.
#[allow(unused)] // It is actually
pub fn load_declarations(name: &str) -> anyhow::Result<Vec<FieldDeclaration>> {
    let path = format!("{}/tests/data/{name}.json", env!("CARGO_MANIFEST_DIR"));
    let mut file = File::open(&path).map_err(|_| anyhow!("File {path} not available"))?;
    let mut contents = vec![];
    file.read_to_end(&mut contents)
        .map_err(|_| anyhow!("File {path} could not be read"))?;

    let declarations = serde_json::from_slice(contents.as_slice())
        .map_err(|e| anyhow!("Could not parse declarations in {path}: {e}"))?;
    Ok(declarations)
}

/// Plans the layout for the declarations in `tests/data/{name}.json` with the
/// default planner configuration.
#[allow(unused)] // It is actually
pub fn plan_from_file(name: &str) -> anyhow::Result<StorageLayout> {
    Ok(plan(&load_declarations(name)?)?)
}

/// Plans the layout for `fields`, numbered in the order provided.
#[allow(unused)] // It is actually
pub fn plan_fields(fields: Vec<(&str, TypeDescriptor)>) -> anyhow::Result<StorageLayout> {
    Ok(Planner::default().plan(&FieldDeclaration::ordered(fields))?)
}

/// Generates between one and `max_fields` well-formed top-level declarations
/// with random types.
#[allow(unused)] // It is actually
pub fn random_declarations(rng: &mut impl Rng, max_fields: usize) -> Vec<FieldDeclaration> {
    let count = rng.gen_range(1..=max_fields);
    let fields = (0..count).map(|i| (format!("field_{i}"), random_type(rng, 0)));
    FieldDeclaration::ordered(fields)
}

/// Generates a random well-formed type, nesting no deeper than three levels.
#[allow(unused)] // It is actually
pub fn random_type(rng: &mut impl Rng, depth: usize) -> TypeDescriptor {
    let choice = if depth >= 3 {
        0
    } else {
        rng.gen_range(0..8)
    };

    match choice {
        // Value types are the most common by some margin.
        0..=2 => random_value(rng),
        3 => TypeDescriptor::fixed_array(random_type(rng, depth + 1), rng.gen_range(1..=6)),
        4 => TypeDescriptor::dynamic_array(random_type(rng, depth + 1)),
        5 => TypeDescriptor::bytes(),
        6 => TypeDescriptor::mapping(random_value(rng), random_type(rng, depth + 1)),
        _ => {
            let count = rng.gen_range(1..=4);
            let members = (0..count)
                .map(|i| (format!("member_{i}"), random_type(rng, depth + 1)))
                .collect::<Vec<_>>();
            TypeDescriptor::structure(members)
        }
    }
}

/// Generates a value type with a random width.
#[allow(unused)] // It is actually
pub fn random_value(rng: &mut impl Rng) -> TypeDescriptor {
    TypeDescriptor::value(rng.gen_range(1..=32))
}
