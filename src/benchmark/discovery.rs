use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::benchmark::parser::OutputParser;
use crate::core::{
    config::{BenchConfig, EngineEntry, ParserConfig},
    engine::EngineBinary,
    error::{BenchmarkError, BenchmarkErrorKind, Result},
    is_executable,
};

/// The engines of one session, keyed and ordered by name.
#[derive(Debug, Clone, Default)]
pub struct EngineRegistry {
    engines: BTreeMap<String, EngineBinary>,
}

impl EngineRegistry {
    pub fn insert(&mut self, engine: EngineBinary) {
        self.engines.insert(engine.name().to_string(), engine);
    }

    pub fn get(&self, name: &str) -> Option<&EngineBinary> {
        self.engines.get(name)
    }

    pub fn engines(&self) -> impl Iterator<Item = &EngineBinary> {
        self.engines.values()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }

    /// Keep only the named engines. A name may be given more than once.
    pub fn select(self, names: &[String]) -> Result<Self> {
        if names.is_empty() {
            return Ok(self);
        }

        let mut selected = BTreeMap::new();
        for name in names {
            let engine = self
                .engines
                .get(name)
                .ok_or_else(|| BenchmarkErrorKind::EngineNotFound { name: name.clone() })?;
            selected.insert(name.clone(), engine.clone());
        }

        Ok(Self { engines: selected })
    }
}

/// Engine name for a binary: its file name, minus a trailing `.exe`.
pub fn engine_name(path: &Path) -> Option<String> {
    let file_name = path.file_name()?.to_string_lossy();
    let name = file_name.strip_suffix(".exe").unwrap_or(&*file_name);
    (!name.is_empty()).then(|| name.to_string())
}

pub fn find_engine_binaries(binaries_dir: &Path, pattern: Option<&str>) -> Result<Vec<PathBuf>> {
    if !binaries_dir.is_dir() {
        return Err(BenchmarkErrorKind::BinariesDirectoryNotFound {
            path: binaries_dir.to_path_buf(),
        }
        .into());
    }

    let pattern = pattern.unwrap_or("");
    let search_pattern = binaries_dir.join(format!("{pattern}*"));

    let mut binaries = Vec::new();
    for path in glob::glob(search_pattern.to_string_lossy().as_ref())?
        .filter_map(std::result::Result::ok)
        .filter(|path| path.is_file())
    {
        if is_executable(&path) {
            binaries.push(path);
        } else {
            tracing::warn!("Skipping {}: not executable", path.display());
        }
    }
    binaries.sort();

    tracing::info!("Found {} engine binaries", binaries.len());
    for binary in &binaries {
        tracing::debug!("  - {}", binary.display());
    }

    Ok(binaries)
}

fn entry_parser(
    entry: Option<&EngineEntry>,
    parser_config: &ParserConfig,
    default_parser: &Arc<OutputParser>,
) -> Result<Arc<OutputParser>> {
    let Some(entry) = entry else {
        return Ok(Arc::clone(default_parser));
    };
    if entry.nps_patterns.is_none() && entry.nodes_patterns.is_none() {
        return Ok(Arc::clone(default_parser));
    }

    let nps = entry
        .nps_patterns
        .as_ref()
        .unwrap_or(&parser_config.nps_patterns);
    let nodes = entry
        .nodes_patterns
        .as_ref()
        .unwrap_or(&parser_config.nodes_patterns);

    Ok(Arc::new(OutputParser::new(nps.as_slice(), nodes.as_slice())?))
}

/// The parser an engine would get, falling back to the global patterns.
pub fn parser_for(
    engine: Option<&str>,
    parser_config: &ParserConfig,
    entries: &BTreeMap<String, EngineEntry>,
) -> Result<Arc<OutputParser>> {
    let default_parser = Arc::new(OutputParser::from_config(parser_config)?);
    let entry = engine.and_then(|name| entries.get(name));
    entry_parser(entry, parser_config, &default_parser)
}

/// Assemble the engines to bench from the binaries directory and the
/// `[engines]` table, then apply the name selection.
pub fn build_registry(
    bench_config: &BenchConfig,
    parser_config: &ParserConfig,
    entries: &BTreeMap<String, EngineEntry>,
) -> Result<EngineRegistry> {
    let default_parser = Arc::new(OutputParser::from_config(parser_config)?);
    let has_explicit_paths = entries.values().any(|entry| entry.path.is_some());

    let discovered = match find_engine_binaries(
        &bench_config.binaries_dir,
        bench_config.pattern.as_deref(),
    ) {
        Ok(binaries) => binaries,
        Err(e)
            if has_explicit_paths
                && matches!(e.kind(), BenchmarkErrorKind::BinariesDirectoryNotFound { .. }) =>
        {
            tracing::debug!("{e}, using configured engine paths only");
            Vec::new()
        }
        Err(e) => return Err(e),
    };

    let mut registry = EngineRegistry::default();

    for path in discovered {
        let Some(name) = engine_name(&path) else {
            continue;
        };
        if let Some(existing) = registry.get(&name) {
            tracing::warn!(
                "Skipping {}: engine '{name}' is already provided by {}",
                path.display(),
                existing.path().display()
            );
            continue;
        }
        let parser = entry_parser(entries.get(&name), parser_config, &default_parser)?;
        registry.insert(EngineBinary::new(name, path, parser));
    }

    for (name, entry) in entries {
        match &entry.path {
            Some(path) => {
                if !path.is_file() {
                    return Err(BenchmarkErrorKind::EngineBinaryNotFound {
                        name: name.clone(),
                        path: path.clone(),
                    }
                    .into());
                }
                if registry.get(name).is_some() {
                    tracing::debug!("Configured path for {name} replaces the discovered binary");
                }
                let parser = entry_parser(Some(entry), parser_config, &default_parser)?;
                registry.insert(EngineBinary::new(name.clone(), path.clone(), parser));
            }
            None if registry.get(name).is_none() => {
                return Err(
                    BenchmarkError::from(BenchmarkErrorKind::EngineNotFound { name: name.clone() })
                        .with_hint(Some(format!(
                            "no binary named '{name}' in {}, set engines.{name}.path",
                            bench_config.binaries_dir.display()
                        ))),
                );
            }
            None => {}
        }
    }

    let registry = registry.select(&bench_config.engines)?;

    if registry.is_empty() {
        return Err(BenchmarkErrorKind::NoEnginesFound {
            pattern: bench_config.pattern.clone().unwrap_or_default(),
            directory: bench_config.binaries_dir.clone(),
        }
        .into());
    }

    Ok(registry)
}
