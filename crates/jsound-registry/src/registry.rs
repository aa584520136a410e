use ahash::AHashMap;
use serde_json::Value;

use crate::{cycles::find_cycles, error::Error, refs::walk_refs};

const ROOT: &str = "#";

/// A registry of the named definitions reachable from a single schema document,
/// together with the in-document `$ref` graph between them.
///
/// Built once per document; [`Registry::build`] fails with [`Error::Cyclic`] if the
/// reference graph (restricted to `#`, `#/$defs/<name>` and `#/definitions/<name>`)
/// contains a nontrivial strongly connected component or a self-loop.
#[derive(Debug, Clone)]
pub struct Registry {
    definitions: AHashMap<String, Value>,
}

impl Registry {
    /// Extracts every `$defs`/`definitions` entry from `root`, builds the reference
    /// graph, and runs Tarjan's SCC algorithm over it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedReference`] or [`Error::UnknownReference`] if a
    /// `$ref` cannot be resolved in-document, [`Error::MalformedSchema`] if `$defs`
    /// or `definitions` is not an object, and [`Error::Cyclic`] if the graph has a
    /// cycle.
    pub fn build(root: &Value) -> Result<Registry, Error> {
        let definitions = extract_definitions(root)?;
        tracing::debug!(count = definitions.len(), "extracted schema definitions");

        let mut nodes: Vec<String> = std::iter::once(ROOT.to_string())
            .chain(definitions.keys().cloned())
            .collect();
        nodes.sort();
        nodes.dedup();

        let mut edges = AHashMap::default();
        for node in &nodes {
            let body = if node == ROOT {
                root
            } else {
                &definitions[node]
            };
            let mut targets = Vec::new();
            walk_refs(body, &mut |reference| {
                targets.push(reference.to_string());
            });
            for target in &targets {
                validate_reference(target, &definitions)?;
            }
            edges.insert(node.clone(), targets);
        }

        let cycles = find_cycles(&nodes, &edges);
        if !cycles.is_empty() {
            tracing::warn!(?cycles, "cyclic $ref graph detected");
            return Err(Error::Cyclic { cycles });
        }

        Ok(Registry { definitions })
    }

    /// Resolves a `$ref` string (`#`, `#/$defs/<name>`, or `#/definitions/<name>`)
    /// against this registry's definitions.
    ///
    /// `root` is needed to resolve the bare `#` reference, since the registry itself
    /// only stores the named definitions.
    pub fn resolve<'a>(&'a self, reference: &str, root: &'a Value) -> Result<&'a Value, Error> {
        if reference == ROOT {
            return Ok(root);
        }
        self.definitions
            .get(reference)
            .ok_or_else(|| Error::unknown_reference(reference))
    }
}

fn validate_reference(reference: &str, definitions: &AHashMap<String, Value>) -> Result<(), Error> {
    if reference == ROOT || definitions.contains_key(reference) {
        return Ok(());
    }
    if reference.starts_with("#/$defs/") || reference.starts_with("#/definitions/") {
        return Err(Error::unknown_reference(reference));
    }
    Err(Error::unsupported_reference(reference))
}

fn extract_definitions(root: &Value) -> Result<AHashMap<String, Value>, Error> {
    let Value::Object(root) = root else {
        return Ok(AHashMap::default());
    };
    let mut definitions = AHashMap::default();
    extract_into(root.get("$defs"), "#/$defs/", &mut definitions)?;
    extract_into(root.get("definitions"), "#/definitions/", &mut definitions)?;
    Ok(definitions)
}

fn extract_into(
    container: Option<&Value>,
    prefix: &str,
    out: &mut AHashMap<String, Value>,
) -> Result<(), Error> {
    let Some(container) = container else {
        return Ok(());
    };
    let Value::Object(map) = container else {
        return Err(Error::malformed(format!(
            "'{}' must be an object",
            prefix.trim_end_matches('/').trim_start_matches("#/")
        )));
    };
    for (name, definition) in map {
        out.insert(format!("{prefix}{name}"), definition.clone());
    }
    Ok(())
}
