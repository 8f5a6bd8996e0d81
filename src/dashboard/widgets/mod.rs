use crate::dashboard::observer::Properties;
use crate::table::TypeTag;
use once_cell::unsync::OnceCell;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

mod basic_properties;
mod boolean_box;
mod graph;
pub mod host;
mod number_bar;
mod text_view;

pub use basic_properties::BasicPropertiesEditor;
pub use boolean_box::{BooleanBoxConfig, BooleanBoxWidget};
pub use graph::{GraphConfig, GraphWidget};
pub use host::{
    EditorFactory, ElementChange, ElementHost, ElementState, ElementWidget, MountContext,
    PropertiesEditor, TableView, TableWriter, TemplateEvent, TemplateHost, TemplateOpts,
    TemplateWidget, WidgetHost,
};
pub use number_bar::{NumberBarConfig, NumberBarWidget};
pub use text_view::{TextViewConfig, TextViewWidget};

pub const BASIC_PROPERTIES: &str = "basic_properties";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertiesConfig {
    pub defaults: Properties,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub is_custom_element: bool,
}

/// Registered description of a widget type. Immutable once registered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetConfig {
    pub accepted_types: BTreeSet<TypeTag>,
    pub properties: PropertiesConfig,
    #[serde(default)]
    pub is_custom_element: bool,
}

impl WidgetConfig {
    pub fn accepts(&self, observed: &BTreeSet<TypeTag>) -> bool {
        accepts(observed, &self.accepted_types)
    }
}

/// A widget accepts a node when nothing has been observed there yet or when
/// at least one observed tag is in its accepted set.
pub fn accepts(observed: &BTreeSet<TypeTag>, accepted: &BTreeSet<TypeTag>) -> bool {
    observed.is_empty() || !observed.is_disjoint(accepted)
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum WidgetConfigError {
    #[error("widget config must be an object")]
    NotAnObject,
    #[error("widget config is missing `{0}`")]
    MissingField(&'static str),
    #[error("unknown type tag '{0}' in acceptedTypes")]
    UnknownType(String),
    #[error("invalid widget config: {0}")]
    Invalid(String),
}

/// Check the required fields of a raw config and parse it.
pub fn validate_config(raw: &Value) -> Result<WidgetConfig, WidgetConfigError> {
    let obj = raw.as_object().ok_or(WidgetConfigError::NotAnObject)?;
    let accepted = obj
        .get("acceptedTypes")
        .ok_or(WidgetConfigError::MissingField("acceptedTypes"))?;
    if obj
        .get("properties")
        .and_then(|p| p.get("defaults"))
        .is_none()
    {
        return Err(WidgetConfigError::MissingField("properties.defaults"));
    }
    if let Some(tags) = accepted.as_array() {
        for tag in tags {
            let name = tag.as_str().unwrap_or_default();
            if TypeTag::parse(name).is_none() {
                return Err(WidgetConfigError::UnknownType(tag.to_string()));
            }
        }
    }
    serde_json::from_value(raw.clone()).map_err(|e| WidgetConfigError::Invalid(e.to_string()))
}

type WidgetCtor = Rc<dyn Fn() -> Box<dyn WidgetHost>>;

/// Descriptor for building widgets of one type.
///
/// The raw config is only validated the first time it is needed; the result
/// is cached for the lifetime of the descriptor.
#[derive(Clone)]
pub struct WidgetDescriptor {
    raw: Value,
    config: Rc<OnceCell<Result<WidgetConfig, WidgetConfigError>>>,
    ctor: WidgetCtor,
}

pub type WidgetFactory = WidgetDescriptor;

impl WidgetDescriptor {
    pub fn from_raw(raw: Value, ctor: impl Fn() -> Box<dyn WidgetHost> + 'static) -> Self {
        Self {
            raw,
            config: Rc::new(OnceCell::new()),
            ctor: Rc::new(ctor),
        }
    }

    /// Element-hosted widget whose defaults come from `C::default()`.
    pub fn element<C, W>(accepted: &[TypeTag]) -> Self
    where
        C: Serialize + Default,
        W: ElementWidget + Default + 'static,
    {
        Self::from_raw(raw_config::<C>(accepted, true), || {
            Box::new(ElementHost::new(W::default()))
        })
    }

    /// Template-hosted widget whose defaults come from `C::default()`.
    pub fn template<C, T>(accepted: &[TypeTag]) -> Self
    where
        C: Serialize + Default,
        T: TemplateWidget + Default + 'static,
    {
        Self::from_raw(raw_config::<C>(accepted, false), || {
            Box::new(TemplateHost::new(T::default()))
        })
    }

    pub fn with_editor(mut self, tag: &str) -> Self {
        if let Some(props) = self
            .raw
            .get_mut("properties")
            .and_then(Value::as_object_mut)
        {
            props.insert("tag".into(), Value::String(tag.to_string()));
        }
        self.config = Rc::new(OnceCell::new());
        self
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn config(&self) -> Result<&WidgetConfig, &WidgetConfigError> {
        self.config
            .get_or_init(|| {
                let result = validate_config(&self.raw);
                if let Err(e) = &result {
                    tracing::warn!(error = %e, "rejecting widget config");
                }
                result
            })
            .as_ref()
    }

    pub fn default_properties(&self) -> Option<Properties> {
        self.config().ok().map(|c| c.properties.defaults.clone())
    }

    pub fn create(&self) -> Box<dyn WidgetHost> {
        (self.ctor)()
    }
}

fn raw_config<C: Serialize + Default>(accepted: &[TypeTag], is_custom_element: bool) -> Value {
    let defaults = serde_json::to_value(C::default()).unwrap_or_else(|_| json!({}));
    json!({
        "acceptedTypes": accepted.iter().map(TypeTag::as_str).collect::<Vec<_>>(),
        "properties": { "defaults": defaults, "tag": null, "isCustomElement": false },
        "isCustomElement": is_custom_element,
    })
}

#[derive(Clone, Default)]
pub struct WidgetRegistry {
    map: HashMap<String, WidgetDescriptor>,
    editors: HashMap<String, EditorFactory>,
}

impl WidgetRegistry {
    pub fn with_defaults() -> Self {
        let mut reg = Self::default();
        reg.register(
            "number_bar",
            WidgetFactory::element::<NumberBarConfig, NumberBarWidget>(&[TypeTag::Number])
                .with_editor(BASIC_PROPERTIES),
        );
        reg.register(
            "graph",
            WidgetFactory::element::<GraphConfig, GraphWidget>(&[
                TypeTag::Number,
                TypeTag::NumberArray,
            ])
            .with_editor(BASIC_PROPERTIES),
        );
        reg.register(
            "text_view",
            WidgetFactory::template::<TextViewConfig, TextViewWidget>(&[TypeTag::String])
                .with_editor(BASIC_PROPERTIES),
        );
        reg.register(
            "boolean_box",
            WidgetFactory::template::<BooleanBoxConfig, BooleanBoxWidget>(&[TypeTag::Boolean])
                .with_editor(BASIC_PROPERTIES),
        );
        reg.register_editor(
            BASIC_PROPERTIES,
            Rc::new(|| Box::new(BasicPropertiesEditor::default())),
        );
        reg
    }

    pub fn register(&mut self, name: &str, factory: WidgetFactory) {
        if self.map.insert(name.to_string(), factory).is_some() {
            tracing::debug!(widget = name, "widget type re-registered");
        }
    }

    pub fn register_editor(&mut self, tag: &str, factory: EditorFactory) {
        self.editors.insert(tag.to_string(), factory);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.map.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn descriptor(&self, name: &str) -> Option<&WidgetDescriptor> {
        self.map.get(name)
    }

    /// Validated config of `name`; `None` when unknown or invalid.
    pub fn config(&self, name: &str) -> Option<WidgetConfig> {
        self.map.get(name)?.config().ok().cloned()
    }

    pub fn create(&self, name: &str) -> Option<Box<dyn WidgetHost>> {
        self.map.get(name).map(|f| f.create())
    }

    pub fn editor(&self, tag: &str) -> Option<EditorFactory> {
        self.editors.get(tag).cloned()
    }

    pub fn create_editor(&self, tag: &str) -> Option<Box<dyn PropertiesEditor>> {
        self.editors.get(tag).map(|f| f())
    }

    pub fn default_properties(&self, name: &str) -> Option<Properties> {
        self.map.get(name).and_then(|f| f.default_properties())
    }

    /// Names of the widget types that accept `observed`.
    pub fn accepting(&self, observed: &BTreeSet<TypeTag>) -> Vec<String> {
        let mut names: Vec<String> = self
            .map
            .iter()
            .filter(|(_, d)| d.config().map_or(false, |c| c.accepts(observed)))
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_come_from_config_struct() {
        let reg = WidgetRegistry::with_defaults();
        let defaults = reg.default_properties("graph").unwrap();
        assert_eq!(defaults.get("color"), Some(&json!("blue")));
        assert_eq!(defaults.get("buffer_size"), Some(&json!(50)));
        let config = reg.config("graph").unwrap();
        assert!(config.is_custom_element);
        assert_eq!(config.properties.tag.as_deref(), Some(BASIC_PROPERTIES));
    }

    #[test]
    fn missing_required_fields_fail_lazily() {
        let descriptor = WidgetDescriptor::from_raw(json!({"acceptedTypes": ["number"]}), || {
            Box::new(ElementHost::new(NumberBarWidget))
        });
        assert_eq!(
            descriptor.config().unwrap_err(),
            &WidgetConfigError::MissingField("properties.defaults")
        );

        let descriptor = WidgetDescriptor::from_raw(
            json!({"acceptedTypes": ["quaternion"], "properties": {"defaults": {}}}),
            || Box::new(ElementHost::new(NumberBarWidget)),
        );
        assert!(matches!(
            descriptor.config(),
            Err(WidgetConfigError::UnknownType(_))
        ));
    }

    #[test]
    fn accepting_lists_compatible_types() {
        let reg = WidgetRegistry::with_defaults();
        let observed = BTreeSet::from([TypeTag::NumberArray]);
        assert_eq!(reg.accepting(&observed), vec!["graph".to_string()]);
    }
}
