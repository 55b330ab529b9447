use thiserror::Error;

use crate::{formula::Formula, mandelbrot::Mandelbrot, newton::Newton, number::Number};

#[derive(Debug, Error)]
#[error("unknown {kind} {name:?}; expected one of: {known}")]
pub struct UnknownPlugin {
    pub kind: &'static str,
    pub name: String,
    pub known: String,
}

type Constructor<T> = Box<dyn Fn() -> Box<T> + Send + Sync>;

/// Named constructors for one kind of plugin.
pub struct Registry<T: ?Sized> {
    kind: &'static str,
    entries: Vec<(&'static str, Constructor<T>)>,
}

impl<T: ?Sized> Registry<T> {
    pub fn new(kind: &'static str) -> Self {
        Registry {
            kind,
            entries: Vec::new(),
        }
    }

    /// Adds a constructor, replacing any previous one with the same name.
    pub fn register<F>(&mut self, name: &'static str, constructor: F) -> &mut Self
    where
        F: Fn() -> Box<T> + Send + Sync + 'static,
    {
        self.entries.retain(|(existing, _)| *existing != name);
        self.entries.push((name, Box::new(constructor)));
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(name, _)| *name)
    }

    pub fn create(&self, name: &str) -> Result<Box<T>, UnknownPlugin> {
        // Linear scan, we don't have that many options:
        for (candidate, constructor) in self.entries.iter() {
            if *candidate == name {
                tracing::debug!(kind = self.kind, name, "resolved plugin");
                return Ok(constructor());
            }
        }
        Err(UnknownPlugin {
            kind: self.kind,
            name: name.to_owned(),
            known: self.names().collect::<Vec<_>>().join(", "),
        })
    }
}

/// The formulas shipped with the core.
pub fn formulas<V: Number>() -> Registry<dyn Formula<V>> {
    let mut registry = Registry::new("formula");
    registry
        .register("mandelbrot", || {
            Box::new(Mandelbrot::<V>::new()) as Box<dyn Formula<V>>
        })
        .register("multibrot3", || {
            Box::new(Mandelbrot::<V>::multibrot(3)) as Box<dyn Formula<V>>
        })
        .register("multibrot4", || {
            Box::new(Mandelbrot::<V>::multibrot(4)) as Box<dyn Formula<V>>
        })
        .register("newton", || Box::new(Newton::<V>::new()) as Box<dyn Formula<V>>);
    registry
}
