//! Explicitly constructed format registry
//!
//! Plugins are looked up by format kind. The registry is immutable once
//! built and passed into the engine rather than living as a global.

use super::multi_group::MultiGroupFormat;
use super::playoff::PlayoffFormat;
use super::preliminary::PreliminaryFormat;
use super::round_robin::RoundRobinFormat;
use super::swiss::SwissFormat;
use super::Format;
use crate::error::{EngineError, Result};
use crate::types::FormatKind;
use std::collections::HashMap;
use std::sync::Arc;

pub struct FormatRegistry {
    formats: HashMap<FormatKind, Arc<dyn Format>>,
}

impl FormatRegistry {
    /// Registry with every built-in format.
    pub fn standard() -> Self {
        let mut formats: HashMap<FormatKind, Arc<dyn Format>> = HashMap::new();
        formats.insert(FormatKind::RoundRobin, Arc::new(RoundRobinFormat));
        formats.insert(FormatKind::Playoff, Arc::new(PlayoffFormat));
        formats.insert(FormatKind::Swiss, Arc::new(SwissFormat));
        formats.insert(FormatKind::MultiGroup, Arc::new(MultiGroupFormat));
        formats.insert(
            FormatKind::PreliminaryWithPlayoff,
            Arc::new(PreliminaryFormat::with_playoff_final()),
        );
        formats.insert(
            FormatKind::PreliminaryWithRoundRobin,
            Arc::new(PreliminaryFormat::with_round_robin_final()),
        );
        Self { formats }
    }

    /// Registry with a custom plugin set, for embedders that restrict or
    /// extend the built-ins.
    pub fn with_formats(formats: Vec<Arc<dyn Format>>) -> Self {
        Self {
            formats: formats
                .into_iter()
                .map(|format| (format.kind(), format))
                .collect(),
        }
    }

    pub fn get(&self, kind: FormatKind) -> Result<Arc<dyn Format>> {
        self.formats
            .get(&kind)
            .cloned()
            .ok_or_else(|| {
                EngineError::UnsupportedOperation {
                    format: kind.to_string(),
                    operation: "no plugin registered for this format".to_string(),
                }
                .into()
            })
    }

    pub fn kinds(&self) -> Vec<FormatKind> {
        self.formats.keys().copied().collect()
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
