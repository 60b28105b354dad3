use crate::{
    error::{Error, ValidationErrors, ValidationRule},
    types::{is_reserved, AttributeValue, SPEC_VERSION},
};
use derive_more::Display;
use fxhash::FxHashMap;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A CloudEvents envelope: the four required context attributes, a map of
/// optional/extension attributes, and at most one data payload.
///
/// Events are immutable once constructed; [`CloudEvent::with_attribute`]
/// returns a new value. Equality is structural and the attribute map
/// compares as a set of entries.
#[derive(Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub struct CloudEvent {
    id: String,
    source: String,
    #[serde(rename = "specversion")]
    spec_version: String,
    #[serde(rename = "type")]
    ty: String,
    attributes: FxHashMap<String, AttributeValue>,
    data: Option<Data>,
}

/// The event payload. Exactly one representation is active; an event
/// without any payload holds no `Data` at all.
#[derive(Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
pub enum Data {
    Binary(Vec<u8>),
    Text(String),
    Structured(StructuredData),
}

/// An opaque typed payload: a type URL paired with its serialized bytes.
#[derive(Clone, Eq, PartialEq, Hash, Debug, Default, Serialize, Deserialize)]
pub struct StructuredData {
    pub type_url: String,
    pub value: Vec<u8>,
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Display, Serialize, Deserialize)]
pub enum DataKind {
    #[display("binary")]
    Binary,
    #[display("text")]
    Text,
    #[display("structured")]
    Structured,
}

impl Data {
    pub fn kind(&self) -> DataKind {
        match self {
            Data::Binary(_) => DataKind::Binary,
            Data::Text(_) => DataKind::Text,
            Data::Structured(_) => DataKind::Structured,
        }
    }
}

impl CloudEvent {
    /// Constructs a validated envelope.
    ///
    /// All four required context attributes must be non-empty and no
    /// extension attribute may shadow a reserved name. On failure every
    /// violated rule is reported; nothing is partially constructed.
    pub fn new<I, S, V, T>(
        id: I,
        source: S,
        spec_version: V,
        ty: T,
        attributes: FxHashMap<String, AttributeValue>,
        data: Option<Data>,
    ) -> Result<Self, Error>
    where
        I: Into<String>,
        S: Into<String>,
        V: Into<String>,
        T: Into<String>,
    {
        let id = id.into();
        let source = source.into();
        let spec_version = spec_version.into();
        let ty = ty.into();

        let mut violations = Vec::new();
        if id.is_empty() {
            violations.push(ValidationRule::EmptyId);
        }
        if source.is_empty() {
            violations.push(ValidationRule::EmptySource);
        }
        if spec_version.is_empty() {
            violations.push(ValidationRule::EmptySpecVersion);
        }
        if ty.is_empty() {
            violations.push(ValidationRule::EmptyType);
        }
        violations.extend(
            attributes
                .keys()
                .filter(|name| is_reserved(name))
                .sorted()
                .map(|name| ValidationRule::ReservedAttribute(name.clone())),
        );
        if !violations.is_empty() {
            return Err(Error::Validation(ValidationErrors(violations)));
        }

        Ok(Self {
            id,
            source,
            spec_version,
            ty,
            attributes,
            data,
        })
    }

    pub fn builder() -> CloudEventBuilder {
        CloudEventBuilder::default()
    }

    /// Identifier of the event, unique within the producer's source scope
    /// (uniqueness is advisory and not enforced here).
    pub fn id(&self) -> &str {
        &self.id
    }

    /// URI-reference identifying the context that produced the event.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// CloudEvents specification revision this envelope conforms to.
    pub fn spec_version(&self) -> &str {
        &self.spec_version
    }

    /// The kind of occurrence this event describes.
    pub fn event_type(&self) -> &str {
        &self.ty
    }

    pub fn attributes(&self) -> &FxHashMap<String, AttributeValue> {
        &self.attributes
    }

    /// Looks up an optional/extension attribute. Required attributes are
    /// reached through their dedicated accessors, never through this map.
    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    /// Returns a new event with the attribute set, overwriting any previous
    /// value for the same name.
    pub fn with_attribute<S, V>(mut self, name: S, value: V) -> Result<Self, Error>
    where
        S: Into<String>,
        V: Into<AttributeValue>,
    {
        let name = name.into();
        if is_reserved(&name) {
            return Err(Error::ReservedAttributeName(name));
        }
        self.attributes.insert(name, value.into());
        Ok(self)
    }

    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }

    pub fn data(&self) -> Option<&Data> {
        self.data.as_ref()
    }

    pub fn as_binary(&self) -> Result<&[u8], Error> {
        match &self.data {
            Some(Data::Binary(bytes)) => Ok(bytes),
            other => Err(Self::wrong_kind(DataKind::Binary, other)),
        }
    }

    pub fn as_text(&self) -> Result<&str, Error> {
        match &self.data {
            Some(Data::Text(text)) => Ok(text),
            other => Err(Self::wrong_kind(DataKind::Text, other)),
        }
    }

    pub fn as_structured(&self) -> Result<&StructuredData, Error> {
        match &self.data {
            Some(Data::Structured(data)) => Ok(data),
            other => Err(Self::wrong_kind(DataKind::Structured, other)),
        }
    }

    fn wrong_kind(requested: DataKind, actual: &Option<Data>) -> Error {
        Error::WrongDataKind {
            requested,
            actual: actual.as_ref().map(Data::kind),
        }
    }
}

/// Fluent construction for [`CloudEvent`].
///
/// `id` defaults to a fresh UUID v4 and `spec_version` to
/// [`SPEC_VERSION`]; everything funnels through [`CloudEvent::new`]
/// validation on [`CloudEventBuilder::build`].
#[derive(Clone, Debug, Default)]
pub struct CloudEventBuilder {
    id: Option<String>,
    source: Option<String>,
    spec_version: Option<String>,
    ty: Option<String>,
    attributes: FxHashMap<String, AttributeValue>,
    data: Option<Data>,
}

impl CloudEventBuilder {
    pub fn id<S: Into<String>>(mut self, id: S) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn source<S: Into<String>>(mut self, source: S) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn spec_version<S: Into<String>>(mut self, spec_version: S) -> Self {
        self.spec_version = Some(spec_version.into());
        self
    }

    pub fn event_type<S: Into<String>>(mut self, ty: S) -> Self {
        self.ty = Some(ty.into());
        self
    }

    pub fn attribute<S, V>(mut self, name: S, value: V) -> Self
    where
        S: Into<String>,
        V: Into<AttributeValue>,
    {
        // Reserved-name shadowing is caught by build()
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn binary_data<B: Into<Vec<u8>>>(mut self, bytes: B) -> Self {
        self.data = Some(Data::Binary(bytes.into()));
        self
    }

    pub fn text_data<S: Into<String>>(mut self, text: S) -> Self {
        self.data = Some(Data::Text(text.into()));
        self
    }

    pub fn structured_data<S, B>(mut self, type_url: S, value: B) -> Self
    where
        S: Into<String>,
        B: Into<Vec<u8>>,
    {
        self.data = Some(Data::Structured(StructuredData {
            type_url: type_url.into(),
            value: value.into(),
        }));
        self
    }

    pub fn build(self) -> Result<CloudEvent, Error> {
        let id = self
            .id
            .unwrap_or_else(|| Uuid::new_v4().hyphenated().to_string());
        let spec_version = self
            .spec_version
            .unwrap_or_else(|| SPEC_VERSION.to_owned());
        CloudEvent::new(
            id,
            self.source.unwrap_or_default(),
            spec_version,
            self.ty.unwrap_or_default(),
            self.attributes,
            self.data,
        )
    }
}
