//! Declarative graph configuration: the YAML/JSON shape accepted by
//! `Orchestrator::create` and the CLI's `wants create`/`wants import`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::value::Value;
use crate::want::{WantMetadata, WantSpec};

/// One want as declared in a config document: identity + spec, without the
/// runtime-only fields (`status`, `state`, `history`) a live [`crate::want::Want`] carries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WantConfig {
    pub metadata: WantMetadata,
    #[serde(default)]
    pub spec: WantSpec,
}

/// A graph document: the unit `Orchestrator::create` accepts and the CLI's
/// `export`/`import` round-trip.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub wants: Vec<WantConfig>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

/// A reusable template: `parameters` gives the recipe's tunable defaults,
/// `template` is a [`Config`] with `${param}` tokens in string-valued spec
/// fields, substituted at recipe-instantiation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipe {
    pub name: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, Value>,
    pub template: Config,
}

impl Recipe {
    /// Instantiate this recipe's template, overriding `parameters` with
    /// `overrides` and substituting every `${name}` token found in
    /// string-valued params and labels with the resolved parameter value's
    /// string form (numbers/bools rendered via `Display`, composite values
    /// rejected as a recipe parameter type).
    pub fn instantiate(&self, overrides: &BTreeMap<String, Value>) -> Config {
        let mut resolved = self.parameters.clone();
        for (k, v) in overrides {
            resolved.insert(k.clone(), v.clone());
        }

        let mut config = self.template.clone();
        for want in &mut config.wants {
            for value in want.spec.params.values_mut() {
                substitute(value, &resolved);
            }
            for label in want.metadata.labels.values_mut() {
                *label = substitute_str(label, &resolved);
            }
        }
        config
    }
}

fn substitute(value: &mut Value, params: &BTreeMap<String, Value>) {
    match value {
        Value::Str(s) => *s = substitute_str(s, params),
        Value::List(items) => items.iter_mut().for_each(|v| substitute(v, params)),
        Value::Map(map) => map.values_mut().for_each(|v| substitute(v, params)),
        _ => {}
    }
}

fn substitute_str(input: &str, params: &BTreeMap<String, Value>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("${") {
        let Some(end) = rest[start..].find('}') else {
            out.push_str(rest);
            return out;
        };
        out.push_str(&rest[..start]);
        let name = &rest[start + 2..start + end];
        match params.get(name) {
            Some(value) => out.push_str(&value.to_string()),
            None => out.push_str(&rest[start..start + end + 1]),
        }
        rest = &rest[start + end + 1..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::want::Selector;

    fn sample_recipe() -> Recipe {
        let mut spec = WantSpec::default();
        spec.params.insert("count".into(), Value::Str("${count}".into()));

        Recipe {
            name: "counter".into(),
            parameters: BTreeMap::from([("count".into(), Value::Int(10))]),
            template: Config {
                wants: vec![WantConfig {
                    metadata: WantMetadata {
                        id: String::new(),
                        name: "source".into(),
                        type_name: "numbers".into(),
                        labels: Default::default(),
                        owner_references: vec![],
                    },
                    spec,
                }],
                metadata: None,
            },
        }
    }

    #[test]
    fn default_parameters_are_substituted() {
        let recipe = sample_recipe();
        let config = recipe.instantiate(&BTreeMap::new());
        assert_eq!(
            config.wants[0].spec.params.get("count"),
            Some(&Value::Str("10".into()))
        );
    }

    #[test]
    fn overrides_win_over_defaults() {
        let recipe = sample_recipe();
        let overrides = BTreeMap::from([("count".into(), Value::Int(99))]);
        let config = recipe.instantiate(&overrides);
        assert_eq!(
            config.wants[0].spec.params.get("count"),
            Some(&Value::Str("99".into()))
        );
    }

    #[test]
    fn unknown_token_is_left_untouched() {
        let literal = substitute_str("${missing}-x", &BTreeMap::new());
        assert_eq!(literal, "${missing}-x");
    }

    #[test]
    fn selector_type_is_still_a_plain_map() {
        let s: Selector = BTreeMap::from([("role".into(), "source".into())]);
        assert_eq!(s.get("role").map(String::as_str), Some("source"));
    }
}
