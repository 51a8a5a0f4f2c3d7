//! The kinds the binary knows about: the built-in media file kind plus every
//! kind declared under `[kinds]` in the configuration.

use anyhow::Context;
use configuration::Config;
use core_types::{AttributeSpec, ModelKind, Validator, ValueType};
use std::collections::BTreeMap;
use std::sync::Arc;

pub const RAW_MEDIA_FILE: &str = "rawmediafile";

/// A media file found on disk, with the title and year parsed from its name.
pub fn raw_media_file() -> Arc<ModelKind> {
    ModelKind::builder(RAW_MEDIA_FILE)
        .attribute("title", AttributeSpec::new(ValueType::Text, "varchar"))
        .attribute(
            "release_year",
            AttributeSpec::new(ValueType::Int, "integer")
                .with_validator(Validator::named("release_year")),
        )
        .attribute("filename", AttributeSpec::new(ValueType::Text, "varchar"))
        .build()
}

/// All known kinds by lower-cased name. A configured kind replaces the
/// built-in one of the same name.
pub fn load(config: &Config) -> anyhow::Result<BTreeMap<String, Arc<ModelKind>>> {
    let mut kinds = BTreeMap::new();
    kinds.insert(RAW_MEDIA_FILE.to_string(), raw_media_file());
    for (name, declaration) in &config.kinds {
        let kind = declaration
            .to_model_kind(name)
            .with_context(|| format!("Kind '{name}' in the configuration is invalid"))?;
        kinds.insert(name.to_lowercase(), kind);
    }
    Ok(kinds)
}
