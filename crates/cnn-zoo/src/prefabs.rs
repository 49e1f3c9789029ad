//! # Config Prefabs for Well-Known Model Configurations

use burn::config::Config;
use std::fmt::Debug;
use std::sync::Arc;

/// Static builder for a [`PreFabConfig`].
pub struct StaticPreFabConfig<C>
where
    C: 'static + Config + Debug + Clone,
{
    /// Name of the model config pre-fab.
    pub name: &'static str,

    /// Description of the model config pre-fab.
    pub description: &'static str,

    /// Builder function for the config.
    pub builder: fn() -> C,
}

impl<C> StaticPreFabConfig<C>
where
    C: 'static + Config + Debug + Clone,
{
    /// Build a new config.
    pub fn new_config(&self) -> C {
        (self.builder)()
    }

    /// Convert to a [`PreFabConfig<C>`].
    pub fn to_prefab(&self) -> PreFabConfig<C> {
        let builder = self.builder;
        PreFabConfig {
            name: self.name.to_string(),
            description: self.description.to_string(),
            builder: Arc::new(builder),
        }
    }

    /// Convert to a [`PreFabConfig`] over another config type.
    pub fn map_prefab<D, F>(
        &self,
        f: F,
    ) -> PreFabConfig<D>
    where
        D: 'static + Config + Debug + Clone,
        F: Fn(C) -> D + Send + Sync + 'static,
    {
        let builder = self.builder;
        PreFabConfig {
            name: self.name.to_string(),
            description: self.description.to_string(),
            builder: Arc::new(move || f(builder())),
        }
    }
}

impl<C> From<&StaticPreFabConfig<C>> for PreFabConfig<C>
where
    C: 'static + Config + Debug + Clone,
{
    fn from(config: &StaticPreFabConfig<C>) -> Self {
        config.to_prefab()
    }
}

impl<C> Debug for StaticPreFabConfig<C>
where
    C: 'static + Config + Debug + Clone,
{
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        self.to_prefab().fmt(f)
    }
}

/// A [`Config`] Well-Known Pre-Fab.
#[derive(Clone)]
pub struct PreFabConfig<C>
where
    C: 'static + Config + Debug + Clone,
{
    /// Name of the model config pre-fab.
    pub name: String,

    /// Description of the model config pre-fab.
    pub description: String,

    /// Builder function for the config.
    pub builder: Arc<dyn Fn() -> C + Send + Sync>,
}

impl<C> Debug for PreFabConfig<C>
where
    C: 'static + Config + Debug + Clone,
{
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        let pretty = f.alternate();

        let type_name = std::any::type_name::<C>();
        let mut handle = f.debug_struct(&format!("PreFabConfig<{type_name}>"));

        handle
            .field("name", &self.name)
            .field("description", &self.description);

        if pretty {
            handle.field("config", &self.new_config());
        }

        handle.finish()
    }
}

impl<C> PreFabConfig<C>
where
    C: 'static + Config + Debug + Clone,
{
    /// Build a new config.
    pub fn new_config(&self) -> C {
        (self.builder)()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Config, Debug)]
    struct WidthConfig {
        width: usize,
    }

    static WIDE: StaticPreFabConfig<WidthConfig> = StaticPreFabConfig {
        name: "wide",
        description: "a wide config",
        builder: || WidthConfig::new(128),
    };

    #[test]
    fn test_static_prefab() {
        assert_eq!(WIDE.new_config().width, 128);

        let prefab: PreFabConfig<WidthConfig> = (&WIDE).into();
        assert_eq!(prefab.name, "wide");
        assert_eq!(prefab.description, "a wide config");
        assert_eq!(prefab.new_config().width, 128);

        let doubled = WIDE.map_prefab(|c: WidthConfig| WidthConfig::new(2 * c.width));
        assert_eq!(doubled.name, "wide");
        assert_eq!(doubled.new_config().width, 256);
    }

    #[test]
    fn test_prefab_debug() {
        let text = format!("{:?}", WIDE);
        assert!(text.contains("PreFabConfig<"));
        assert!(text.contains("name: \"wide\""));
        assert!(!text.contains("width: 128"));

        let pretty = format!("{:#?}", WIDE);
        assert!(pretty.contains("width: 128"));
    }
}
