//! Built-in scenario corpus, compiled into the binary from `scenarios/`.

use crate::core::errors::Result;
use crate::scenario::format::{self, Scenario, SourceFormat};

/// `(id, toml)` pairs, sorted by id.
pub const BUILTIN: &[(&str, &str)] = &[
    ("dd/dd1_1", include_str!("../../scenarios/dd/dd1_1.toml")),
    ("dd/dd2_2", include_str!("../../scenarios/dd/dd2_2.toml")),
    (
        "feedback/comment10",
        include_str!("../../scenarios/feedback/comment10.toml"),
    ),
    (
        "feedback/comment5",
        include_str!("../../scenarios/feedback/comment5.toml"),
    ),
    ("greendoc/h4", include_str!("../../scenarios/greendoc/h4.toml")),
    ("greendoc/h7", include_str!("../../scenarios/greendoc/h7.toml")),
    ("greendoc/m1", include_str!("../../scenarios/greendoc/m1.toml")),
    ("greendoc/m3", include_str!("../../scenarios/greendoc/m3.toml")),
    ("greendoc/m4", include_str!("../../scenarios/greendoc/m4.toml")),
    (
        "smoke/hdmi_replug_usb",
        include_str!("../../scenarios/smoke/hdmi_replug_usb.toml"),
    ),
    (
        "smoke/internal_replug_usb",
        include_str!("../../scenarios/smoke/internal_replug_usb.toml"),
    ),
];

/// Parse the built-in corpus.
pub fn load() -> Result<Vec<Scenario>> {
    let mut out = Vec::with_capacity(BUILTIN.len());
    for (id, text) in BUILTIN {
        if let Some(spec) = format::parse(id, text, SourceFormat::Toml)? {
            out.push(Scenario {
                id: (*id).to_string(),
                source: None,
                spec,
            });
        }
    }
    Ok(out)
}
