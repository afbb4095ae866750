//! # Plugin Registry
//!
//! Plugins contribute named generators (`faker.person.firstName`,
//! `weekday`, ...) that field expressions invoke like builtin calls.
//! Registration flattens every generator into a single namespace; later
//! registrations win on name collisions. Invocation passes already-reduced
//! argument values plus a context carrying the PRNG handle and the record
//! under construction.
//!
//! The builtin plugin libraries themselves live outside the core; this
//! module only defines the contract.

use crate::error::CompileResult;
use crate::rng::Prng;
use crate::value::{Record, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Invocation context handed to every generator call.
pub struct PluginContext<'a> {
    /// The compile-wide PRNG; draws advance the shared stream.
    pub prng: &'a mut Prng,
    /// The record under construction, if the call happens inside one.
    pub record: Option<&'a Record>,
}

/// A generator callable: evaluated arguments in, value out.
pub type GeneratorFn =
    Arc<dyn Fn(&[Value], &mut PluginContext<'_>) -> CompileResult<Value> + Send + Sync>;

/// A plugin: a name plus its generator table. Generator keys may be bare
/// (`weekday`) or dotted (`faker.person.firstName`).
pub struct Plugin {
    pub name: String,
    pub generators: Vec<(String, GeneratorFn)>,
}

impl Plugin {
    pub fn new(name: impl Into<String>) -> Self {
        Plugin {
            name: name.into(),
            generators: Vec::new(),
        }
    }

    pub fn with_generator(
        mut self,
        name: impl Into<String>,
        generator: impl Fn(&[Value], &mut PluginContext<'_>) -> CompileResult<Value>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.generators.push((name.into(), Arc::new(generator)));
        self
    }
}

impl fmt::Debug for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plugin")
            .field("name", &self.name)
            .field("generators", &self.generators.len())
            .finish()
    }
}

/// Flat map from generator name to callable.
#[derive(Default, Clone)]
pub struct PluginRegistry {
    generators: HashMap<String, GeneratorFn>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        PluginRegistry::default()
    }

    /// Insert every generator of the plugin. Later registrations replace
    /// earlier ones of the same name.
    pub fn register(&mut self, plugin: Plugin) {
        for (name, generator) in plugin.generators {
            tracing::debug!(plugin = %plugin.name, generator = %name, "registering generator");
            self.generators.insert(name, generator);
        }
    }

    pub fn get(&self, name: &str) -> Option<&GeneratorFn> {
        self.generators.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.generators.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.generators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.generators.is_empty()
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.generators.keys().collect();
        names.sort();
        f.debug_struct("PluginRegistry")
            .field("generators", &names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_invoke() {
        let mut registry = PluginRegistry::new();
        registry.register(Plugin::new("greeter").with_generator("greet", |args, _ctx| {
            let name = args.first().and_then(Value::as_str).unwrap_or("world");
            Ok(Value::string(format!("hello {name}")))
        }));

        let generator = registry.get("greet").expect("registered");
        let mut prng = Prng::seeded(1);
        let mut ctx = PluginContext {
            prng: &mut prng,
            record: None,
        };
        let out = generator(&[Value::string("vague")], &mut ctx).expect("invoke");
        assert_eq!(out, Value::string("hello vague"));
    }

    #[test]
    fn later_registration_wins() {
        let mut registry = PluginRegistry::new();
        registry.register(
            Plugin::new("a").with_generator("pick", |_, _| Ok(Value::Int(1))),
        );
        registry.register(
            Plugin::new("b").with_generator("pick", |_, _| Ok(Value::Int(2))),
        );

        let generator = registry.get("pick").expect("registered");
        let mut prng = Prng::seeded(1);
        let mut ctx = PluginContext {
            prng: &mut prng,
            record: None,
        };
        assert_eq!(generator(&[], &mut ctx).expect("invoke"), Value::Int(2));
    }

    #[test]
    fn generators_can_draw_randomness() {
        let mut registry = PluginRegistry::new();
        registry.register(Plugin::new("dice").with_generator("d6", |_, ctx| {
            Ok(Value::Int(ctx.prng.range_int(1, 6)))
        }));

        let generator = registry.get("d6").expect("registered");
        let mut prng = Prng::seeded(9);
        let mut ctx = PluginContext {
            prng: &mut prng,
            record: None,
        };
        for _ in 0..20 {
            let Value::Int(v) = generator(&[], &mut ctx).expect("invoke") else {
                panic!("expected int");
            };
            assert!((1..=6).contains(&v));
        }
    }
}
