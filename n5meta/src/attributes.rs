//! The attributes document of an N5 group or array.
//!
//! Every N5 group and array stores its attributes as a JSON object in an `attributes.json` file.
//! For arrays, the document includes the array keys (`dimensions`, `dataType`, `blockSize` and
//! `compression`) which are owned by whatever created the array.
//!
//! [`N5Attributes`] guards such a document: the array keys can never be written or removed, and
//! in [`WriteMode::Gentle`] (the default) neither can any other key which is already present.

use std::{
    fmt,
    io::Write,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize, Serializer, de::DeserializeOwned, ser};
use serde_json::{Map, Value};
use thiserror::Error;

/// The name of the attributes file of a group or array.
pub const ATTRIBUTES_FILE: &str = "attributes.json";

/// The keys describing an array, which are reserved.
pub const ARRAY_ATTRIBUTE_KEYS: [&str; 4] = ["dimensions", "dataType", "blockSize", "compression"];

/// Returns true if `key` is one of the reserved [`ARRAY_ATTRIBUTE_KEYS`].
#[must_use]
pub fn is_reserved_key(key: &str) -> bool {
    ARRAY_ATTRIBUTE_KEYS.contains(&key)
}

/// A document or value does not conform to the expected schema.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// The attributes document is not a JSON object.
    #[error("attributes must be a JSON object, got {0}")]
    NotAnObject(&'static str),
    /// A value cannot be represented as JSON, or does not have the expected structure.
    #[error("invalid value for key '{key}': {reason}")]
    InvalidValue {
        /// The key.
        key: String,
        /// Why the value is invalid.
        reason: String,
    },
    /// The array keys are present but malformed.
    #[error("invalid array attributes: {0}")]
    InvalidArrayAttributes(String),
}

/// An attributes error.
#[derive(Debug, Error)]
pub enum AttributesError {
    /// The directory of the group or array does not exist.
    #[error("directory does not exist: {}", .0.display())]
    NotFound(PathBuf),
    /// A schema error.
    #[error(transparent)]
    Schema(#[from] SchemaError),
    /// An attempt to write or remove one of the reserved array keys.
    #[error("cannot write reserved key '{0}'")]
    ReservedKey(String),
    /// An attempt to overwrite or remove an existing key in gentle mode.
    #[error("key already exists: '{0}'")]
    KeyConflict(String),
    /// The key is not present.
    #[error("no such key: '{0}'")]
    MissingKey(String),
    /// The attributes file is not valid JSON.
    #[error("invalid JSON in {}: {source}", path.display())]
    InvalidJson {
        /// The path of the attributes file.
        path: PathBuf,
        /// The underlying error.
        source: serde_json::Error,
    },
    /// A serialization error.
    #[error(transparent)]
    Serialize(#[from] serde_json::Error),
    /// An IO error.
    #[error(transparent)]
    IOError(#[from] std::io::Error),
}

/// Whether existing keys may be overwritten or removed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WriteMode {
    /// Existing keys can neither be overwritten nor removed.
    #[default]
    Gentle,
    /// Existing keys can be overwritten and removed, with a warning.
    Forceful,
}

impl WriteMode {
    /// [`WriteMode::Forceful`] if `force`, otherwise [`WriteMode::Gentle`].
    #[must_use]
    pub const fn from_force(force: bool) -> Self {
        if force { Self::Forceful } else { Self::Gentle }
    }
}

/// The compression of an array, either by name or as a configuration object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Compression {
    /// A compression name, e.g. `"gzip"`.
    Name(String),
    /// A compression configuration, e.g. `{"type": "gzip", "level": -1}`.
    Configuration(Map<String, Value>),
}

/// The array keys of an attributes document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArrayAttributes {
    /// The shape of the array.
    pub dimensions: Vec<u64>,
    /// The data type, e.g. `uint8`.
    pub data_type: String,
    /// The shape of a block.
    pub block_size: Vec<u64>,
    /// The compression.
    pub compression: Compression,
}

/// Options for [`N5Attributes::to_dir`].
#[derive(Debug, Clone)]
pub struct SaveOptions {
    pretty: bool,
    dry_run: bool,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            pretty: true,
            dry_run: false,
        }
    }
}

impl SaveOptions {
    /// Set whether to sort keys and indent the output. Enabled by default.
    pub fn pretty(&mut self, pretty: bool) -> &mut Self {
        self.pretty = pretty;
        self
    }

    /// Set whether to skip writing and only output what would be written. Disabled by default.
    pub fn dry_run(&mut self, dry_run: bool) -> &mut Self {
        self.dry_run = dry_run;
        self
    }
}

/// The attributes document of an N5 group or array.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct N5Attributes {
    attributes: Map<String, Value>,
    mode: WriteMode,
}

impl N5Attributes {
    /// Create an empty attributes document.
    #[must_use]
    pub fn new(mode: WriteMode) -> Self {
        Self {
            attributes: Map::new(),
            mode,
        }
    }

    /// Create an attributes document from a JSON object.
    #[must_use]
    pub fn from_map(attributes: Map<String, Value>, mode: WriteMode) -> Self {
        Self { attributes, mode }
    }

    /// Create an attributes document from a JSON value.
    ///
    /// # Errors
    /// Returns a [`SchemaError`] if `value` is not a JSON object.
    pub fn from_value(value: Value, mode: WriteMode) -> Result<Self, SchemaError> {
        match value {
            Value::Object(attributes) => Ok(Self::from_map(attributes, mode)),
            other => Err(SchemaError::NotAnObject(json_type_name(&other))),
        }
    }

    /// Read the attributes document in directory `dir`.
    ///
    /// Returns an empty document if `dir` has no attributes file.
    ///
    /// # Errors
    /// Returns an [`AttributesError`] if
    /// - `dir` is not an existing directory,
    /// - the attributes file cannot be read or is not valid JSON, or
    /// - the document is not a JSON object.
    pub fn from_dir<P: AsRef<Path>>(dir: P, mode: WriteMode) -> Result<Self, AttributesError> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(AttributesError::NotFound(dir.to_path_buf()));
        }
        let path = dir.join(ATTRIBUTES_FILE);
        if !path.is_file() {
            return Ok(Self::new(mode));
        }
        let bytes = std::fs::read(&path)?;
        let value: Value = serde_json::from_slice(&bytes)
            .map_err(|source| AttributesError::InvalidJson { path, source })?;
        Ok(Self::from_value(value, mode)?)
    }

    /// Write the attributes document to directory `dir`.
    ///
    /// In dry-run mode, the document is printed to standard output instead.
    ///
    /// # Errors
    /// Returns an [`AttributesError`] if the document cannot be serialized or written.
    pub fn to_dir<P: AsRef<Path>>(
        &self,
        dir: P,
        options: &SaveOptions,
    ) -> Result<(), AttributesError> {
        self.to_dir_with_output(dir, options, &mut std::io::stdout().lock())
    }

    /// Write the attributes document to directory `dir`, or to `output` in dry-run mode.
    ///
    /// # Errors
    /// Returns an [`AttributesError`] if the document cannot be serialized or written.
    pub fn to_dir_with_output<P: AsRef<Path>, W: Write + ?Sized>(
        &self,
        dir: P,
        options: &SaveOptions,
        output: &mut W,
    ) -> Result<(), AttributesError> {
        let json = self.to_json_string(options.pretty)?;
        let path = dir.as_ref().join(ATTRIBUTES_FILE);
        if options.dry_run {
            log::info!("Dry-run mode: would write to {}", path.display());
            writeln!(output, "{json}")?;
        } else {
            std::fs::write(&path, json)?;
        }
        Ok(())
    }

    /// Serialize the attributes document.
    ///
    /// Pretty output has the keys of every object sorted and is indented by two spaces.
    /// Compact output preserves the key order of the document.
    ///
    /// # Errors
    /// Returns a [`serde_json::Error`] if serialization fails.
    pub fn to_json_string(&self, pretty: bool) -> Result<String, serde_json::Error> {
        if pretty {
            serde_json::to_string_pretty(&sorted(&Value::Object(self.attributes.clone())))
        } else {
            serde_json::to_string(&self.attributes)
        }
    }

    /// The write mode.
    #[must_use]
    pub const fn mode(&self) -> WriteMode {
        self.mode
    }

    /// Returns true if all of the [`ARRAY_ATTRIBUTE_KEYS`] are present.
    #[must_use]
    pub fn has_array_descriptor(&self) -> bool {
        ARRAY_ATTRIBUTE_KEYS
            .iter()
            .all(|key| self.attributes.contains_key(*key))
    }

    /// The number of axes of the array, or [`None`] if this is not an array.
    #[must_use]
    pub fn axis_count(&self) -> Option<usize> {
        if !self.has_array_descriptor() {
            return None;
        }
        self.attributes
            .get("dimensions")
            .and_then(Value::as_array)
            .map(Vec::len)
    }

    /// The array keys, or [`None`] if this is not an array.
    ///
    /// # Errors
    /// Returns a [`SchemaError`] if the array keys are present but malformed.
    pub fn array_attributes(&self) -> Result<Option<ArrayAttributes>, SchemaError> {
        if !self.has_array_descriptor() {
            return Ok(None);
        }
        let array: Map<String, Value> = ARRAY_ATTRIBUTE_KEYS
            .iter()
            .filter_map(|key| Some(((*key).to_string(), self.attributes.get(*key)?.clone())))
            .collect();
        let array: ArrayAttributes = serde_json::from_value(Value::Object(array))
            .map_err(|err| SchemaError::InvalidArrayAttributes(err.to_string()))?;
        if array.block_size.len() != array.dimensions.len() {
            return Err(SchemaError::InvalidArrayAttributes(format!(
                "block size {:?} does not match dimensions {:?}",
                array.block_size, array.dimensions
            )));
        }
        Ok(Some(array))
    }

    /// Returns true if `key` is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }

    /// Get the value of `key`.
    ///
    /// # Errors
    /// Returns [`AttributesError::MissingKey`] if `key` is not present.
    pub fn get(&self, key: &str) -> Result<&Value, AttributesError> {
        self.attributes
            .get(key)
            .ok_or_else(|| AttributesError::MissingKey(key.to_string()))
    }

    /// Get the value of `key` as a `T`.
    ///
    /// # Errors
    /// Returns [`AttributesError::MissingKey`] if `key` is not present, or a [`SchemaError`] if the value is not a `T`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<T, AttributesError> {
        let value = self.get(key)?.clone();
        serde_json::from_value(value).map_err(|err| {
            SchemaError::InvalidValue {
                key: key.to_string(),
                reason: err.to_string(),
            }
            .into()
        })
    }

    /// Set `key` to `value`.
    ///
    /// The document is unchanged if this fails.
    ///
    /// # Errors
    /// Returns an [`AttributesError`] if
    /// - `key` is one of the reserved [`ARRAY_ATTRIBUTE_KEYS`],
    /// - `key` is present and the mode is [`WriteMode::Gentle`], or
    /// - `value` cannot be represented as JSON, e.g. it contains a NaN or infinite number.
    pub fn set<T: Serialize + ?Sized>(
        &mut self,
        key: &str,
        value: &T,
    ) -> Result<(), AttributesError> {
        if is_reserved_key(key) {
            return Err(AttributesError::ReservedKey(key.to_string()));
        }
        let invalid_value = |reason: String| SchemaError::InvalidValue {
            key: key.to_string(),
            reason,
        };
        // serde_json writes non-finite floats as null
        value
            .serialize(FiniteFloats)
            .map_err(|err| invalid_value(err.to_string()))?;
        let value = serde_json::to_value(value).map_err(|err| invalid_value(err.to_string()))?;
        if self.attributes.contains_key(key) {
            match self.mode {
                WriteMode::Gentle => return Err(AttributesError::KeyConflict(key.to_string())),
                WriteMode::Forceful => log::warn!("Key already exists: '{key}'"),
            }
        }
        self.attributes.insert(key.to_string(), value);
        Ok(())
    }

    /// Remove `key`, returning its value.
    ///
    /// # Errors
    /// Returns an [`AttributesError`] if
    /// - `key` is one of the reserved [`ARRAY_ATTRIBUTE_KEYS`],
    /// - `key` is present and the mode is [`WriteMode::Gentle`], or
    /// - `key` is not present.
    pub fn remove(&mut self, key: &str) -> Result<Value, AttributesError> {
        if is_reserved_key(key) {
            return Err(AttributesError::ReservedKey(key.to_string()));
        }
        if !self.attributes.contains_key(key) {
            return Err(AttributesError::MissingKey(key.to_string()));
        }
        match self.mode {
            WriteMode::Gentle => Err(AttributesError::KeyConflict(key.to_string())),
            WriteMode::Forceful => {
                log::warn!("Removing existing key: '{key}'");
                self.attributes
                    .remove(key)
                    .ok_or_else(|| AttributesError::MissingKey(key.to_string()))
            }
        }
    }

    /// The keys, in document order.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.attributes.keys()
    }

    /// The key-value pairs, in document order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.attributes.iter()
    }

    /// The number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Returns true if the document has no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// The underlying JSON object.
    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.attributes
    }
}

#[derive(Debug, Error)]
#[error("{0}")]
struct NonFiniteError(String);

impl ser::Error for NonFiniteError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Self(msg.to_string())
    }
}

/// A serializer which visits a value and fails on the first NaN or infinite float.
#[derive(Clone, Copy)]
struct FiniteFloats;

macro_rules! accept_primitives {
    ($($method:ident($ty:ty)),* $(,)?) => {
        $(
            fn $method(self, _: $ty) -> Result<(), NonFiniteError> {
                Ok(())
            }
        )*
    };
}

impl Serializer for FiniteFloats {
    type Ok = ();
    type Error = NonFiniteError;
    type SerializeSeq = Self;
    type SerializeTuple = Self;
    type SerializeTupleStruct = Self;
    type SerializeTupleVariant = Self;
    type SerializeMap = Self;
    type SerializeStruct = Self;
    type SerializeStructVariant = Self;

    accept_primitives!(
        serialize_bool(bool),
        serialize_i8(i8),
        serialize_i16(i16),
        serialize_i32(i32),
        serialize_i64(i64),
        serialize_i128(i128),
        serialize_u8(u8),
        serialize_u16(u16),
        serialize_u32(u32),
        serialize_u64(u64),
        serialize_u128(u128),
        serialize_char(char),
        serialize_str(&str),
        serialize_bytes(&[u8]),
        serialize_unit_struct(&'static str),
    );

    fn serialize_f32(self, v: f32) -> Result<(), NonFiniteError> {
        self.serialize_f64(f64::from(v))
    }

    fn serialize_f64(self, v: f64) -> Result<(), NonFiniteError> {
        if v.is_finite() {
            Ok(())
        } else {
            Err(NonFiniteError(format!("{v} is not a finite number")))
        }
    }

    fn serialize_none(self) -> Result<(), NonFiniteError> {
        Ok(())
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<(), NonFiniteError> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<(), NonFiniteError> {
        Ok(())
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
    ) -> Result<(), NonFiniteError> {
        Ok(())
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<(), NonFiniteError> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        value: &T,
    ) -> Result<(), NonFiniteError> {
        value.serialize(self)
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self, NonFiniteError> {
        Ok(self)
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self, NonFiniteError> {
        Ok(self)
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self, NonFiniteError> {
        Ok(self)
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self, NonFiniteError> {
        Ok(self)
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self, NonFiniteError> {
        Ok(self)
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<Self, NonFiniteError> {
        Ok(self)
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self, NonFiniteError> {
        Ok(self)
    }
}

impl ser::SerializeSeq for FiniteFloats {
    type Ok = ();
    type Error = NonFiniteError;

    fn serialize_element<T: Serialize + ?Sized>(
        &mut self,
        value: &T,
    ) -> Result<(), NonFiniteError> {
        value.serialize(*self)
    }

    fn end(self) -> Result<(), NonFiniteError> {
        Ok(())
    }
}

impl ser::SerializeTuple for FiniteFloats {
    type Ok = ();
    type Error = NonFiniteError;

    fn serialize_element<T: Serialize + ?Sized>(
        &mut self,
        value: &T,
    ) -> Result<(), NonFiniteError> {
        value.serialize(*self)
    }

    fn end(self) -> Result<(), NonFiniteError> {
        Ok(())
    }
}

impl ser::SerializeTupleStruct for FiniteFloats {
    type Ok = ();
    type Error = NonFiniteError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        value: &T,
    ) -> Result<(), NonFiniteError> {
        value.serialize(*self)
    }

    fn end(self) -> Result<(), NonFiniteError> {
        Ok(())
    }
}

impl ser::SerializeTupleVariant for FiniteFloats {
    type Ok = ();
    type Error = NonFiniteError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        value: &T,
    ) -> Result<(), NonFiniteError> {
        value.serialize(*self)
    }

    fn end(self) -> Result<(), NonFiniteError> {
        Ok(())
    }
}

impl ser::SerializeMap for FiniteFloats {
    type Ok = ();
    type Error = NonFiniteError;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> Result<(), NonFiniteError> {
        key.serialize(*self)
    }

    fn serialize_value<T: Serialize + ?Sized>(
        &mut self,
        value: &T,
    ) -> Result<(), NonFiniteError> {
        value.serialize(*self)
    }

    fn end(self) -> Result<(), NonFiniteError> {
        Ok(())
    }
}

impl ser::SerializeStruct for FiniteFloats {
    type Ok = ();
    type Error = NonFiniteError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        _key: &'static str,
        value: &T,
    ) -> Result<(), NonFiniteError> {
        value.serialize(*self)
    }

    fn end(self) -> Result<(), NonFiniteError> {
        Ok(())
    }
}

impl ser::SerializeStructVariant for FiniteFloats {
    type Ok = ();
    type Error = NonFiniteError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        _key: &'static str,
        value: &T,
    ) -> Result<(), NonFiniteError> {
        value.serialize(*self)
    }

    fn end(self) -> Result<(), NonFiniteError> {
        Ok(())
    }
}

/// Recursively sort the keys of every object in `value`.
fn sorted(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(key, value)| (key.clone(), sorted(value)))
                    .collect(),
            )
        }
        Value::Array(values) => Value::Array(values.iter().map(sorted).collect()),
        other => other.clone(),
    }
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
