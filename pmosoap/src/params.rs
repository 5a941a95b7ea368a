//! Call parameters and requests

use indexmap::IndexMap;

/// Value bound to a parameter element
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    /// Text content, escaped on emission
    Text(String),
    /// Child elements
    Nested(Params),
    /// The element repeated once per item
    List(Vec<ParamValue>),
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Text(value)
    }
}

impl From<Params> for ParamValue {
    fn from(value: Params) -> Self {
        ParamValue::Nested(value)
    }
}

impl<T: Into<ParamValue>> From<Vec<T>> for ParamValue {
    fn from(values: Vec<T>) -> Self {
        ParamValue::List(values.into_iter().map(Into::into).collect())
    }
}

/// Macro to generate `From` conversions for scalar values rendered with `Display`
macro_rules! impl_text_param {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for ParamValue {
                fn from(value: $ty) -> Self {
                    ParamValue::Text(value.to_string())
                }
            }
        )*
    };
}

impl_text_param!(bool, char, i8, i16, i32, i64, u8, u16, u32, u64, usize, f32, f64);

/// Ordered mapping of parameter name to value.
///
/// Insertion order is the emission order. Inserting an existing name replaces
/// its value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params(IndexMap<String, ParamValue>);

/// Parameters emitted inside the SOAP Header
pub type HeaderParams = Params;

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insertion
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Overlay `other` on top of `self`
    pub fn merged(&self, other: &Params) -> Params {
        let mut merged = self.clone();
        for (name, value) in other.iter() {
            merged.0.insert(name.to_string(), value.clone());
        }
        merged
    }
}

impl<K, V> FromIterator<(K, V)> for Params
where
    K: Into<String>,
    V: Into<ParamValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

/// Types that can be sent as a SOAP call.
///
/// Implemented by caller types in place of the struct reflection other SOAP
/// toolkits rely on.
///
/// ```
/// use pmosoap::{Params, ToParams};
///
/// struct GetPrice {
///     item: String,
///     quantity: u32,
/// }
///
/// impl ToParams for GetPrice {
///     fn method(&self) -> &str {
///         "GetPrice"
///     }
///
///     fn to_params(&self) -> Params {
///         Params::new()
///             .with("Item", self.item.as_str())
///             .with("Quantity", self.quantity)
///     }
/// }
/// ```
pub trait ToParams {
    /// Operation name
    fn method(&self) -> &str;

    /// Body parameters, in emission order
    fn to_params(&self) -> Params;

    /// Per-call header parameters
    fn header_params(&self) -> Option<HeaderParams> {
        None
    }
}

/// A single SOAP call: operation name plus its parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    method: String,
    params: Params,
    header_params: Option<HeaderParams>,
}

impl Request {
    pub fn new(method: impl Into<String>, params: Params) -> Self {
        Self {
            method: method.into(),
            params,
            header_params: None,
        }
    }

    /// Build a request from a caller type
    pub fn from_params<T: ToParams + ?Sized>(value: &T) -> Self {
        Self {
            method: value.method().to_string(),
            params: value.to_params(),
            header_params: value.header_params(),
        }
    }

    /// Header parameters for this call only, overlaid on the client's
    pub fn with_header_params(mut self, header_params: HeaderParams) -> Self {
        self.header_params = Some(header_params);
        self
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn header_params(&self) -> Option<&HeaderParams> {
        self.header_params.as_ref()
    }
}
