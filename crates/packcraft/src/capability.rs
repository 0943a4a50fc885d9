//! Host capabilities invoked by the resolver and the accessors.
//!
//! Position functions, size functions and composite codecs are supplied by the
//! schema author. They must be pure with respect to the buffer: read-only, no
//! retained references, no mutation. The crate trusts this and cannot check it.

use std::{fmt, sync::Arc};

/// Computes a field offset from the buffer and the sequentially inferred default.
pub trait PositionFunction: Send + Sync {
    fn position(&self, data: &[u8], default: usize) -> usize;
}

impl<F> PositionFunction for F
where
    F: Fn(&[u8], usize) -> usize + Send + Sync,
{
    fn position(&self, data: &[u8], default: usize) -> usize {
        self(data, default)
    }
}

/// Computes a field length from the buffer, e.g. from a header-length subfield.
pub trait SizeFunction: Send + Sync {
    fn size(&self, data: &[u8]) -> usize;
}

impl<F> SizeFunction for F
where
    F: Fn(&[u8]) -> usize + Send + Sync,
{
    fn size(&self, data: &[u8]) -> usize {
        self(data)
    }
}

/// A host type that can be built over a byte range and copied back into one.
pub trait CompositeCodec: Send + Sync {
    /// Type-level size constant, if the type has one.
    fn static_size(&self) -> Option<usize>;

    /// Checks the sub-range a value is constructed from and returns the bytes it views.
    fn construct<'a>(&self, bytes: &'a [u8]) -> Option<&'a [u8]> {
        Some(bytes)
    }

    /// Copies a value's bytes into `destination`. Returns false if they do not fit.
    fn copy_into(&self, value: &[u8], destination: &mut [u8]) -> bool {
        if value.len() != destination.len() {
            return false;
        }
        destination.copy_from_slice(value);
        true
    }

    /// Renders a value for summaries.
    fn format(&self, bytes: &[u8], f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in bytes.iter().enumerate() {
            if i > 0 {
                f.write_str(":")?;
            }
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// A capability together with the name the schema refers to it by.
///
/// Equality is by name: the emitted plan refers to capabilities symbolically.
pub struct Capability<T: ?Sized> {
    name: Arc<str>,
    inner: Arc<T>,
}

pub type PositionFn = Capability<dyn PositionFunction>;
pub type SizeFn = Capability<dyn SizeFunction>;
pub type CompositeRef = Capability<dyn CompositeCodec>;

impl<T: ?Sized> Capability<T> {
    pub fn from_arc(name: impl Into<Arc<str>>, inner: Arc<T>) -> Self {
        Self {
            name: name.into(),
            inner,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Capability<dyn PositionFunction> {
    pub fn new<F>(name: impl Into<Arc<str>>, function: F) -> Self
    where
        F: Fn(&[u8], usize) -> usize + Send + Sync + 'static,
    {
        Self::from_arc(name, Arc::new(function))
    }

    pub fn call(&self, data: &[u8], default: usize) -> usize {
        self.inner.position(data, default)
    }
}

impl Capability<dyn SizeFunction> {
    pub fn new<F>(name: impl Into<Arc<str>>, function: F) -> Self
    where
        F: Fn(&[u8]) -> usize + Send + Sync + 'static,
    {
        Self::from_arc(name, Arc::new(function))
    }

    pub fn call(&self, data: &[u8]) -> usize {
        self.inner.size(data)
    }
}

impl Capability<dyn CompositeCodec> {
    pub fn new(name: impl Into<Arc<str>>, codec: impl CompositeCodec + 'static) -> Self {
        Self::from_arc(name, Arc::new(codec))
    }

    pub fn codec(&self) -> &dyn CompositeCodec {
        &*self.inner
    }

    pub fn static_size(&self) -> Option<usize> {
        self.inner.static_size()
    }
}

impl<T: ?Sized> Clone for Capability<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            inner: self.inner.clone(),
        }
    }
}

impl<T: ?Sized> fmt::Debug for Capability<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Capability").field(&self.name).finish()
    }
}

impl<T: ?Sized> fmt::Display for Capability<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl<T: ?Sized> PartialEq for Capability<T> {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl<T: ?Sized> Eq for Capability<T> {}

#[cfg(feature = "serde")]
impl<T: ?Sized> serde::Serialize for Capability<T> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.name)
    }
}

/// Plain byte-array composite, e.g. a hardware address.
///
/// With a fixed size it carries its own `Size` constant; a dynamic one needs
/// an external size on the field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteArrayCodec {
    size: Option<usize>,
}

impl ByteArrayCodec {
    pub const fn fixed(size: usize) -> Self {
        Self { size: Some(size) }
    }

    pub const fn dynamic() -> Self {
        Self { size: None }
    }
}

impl CompositeCodec for ByteArrayCodec {
    fn static_size(&self) -> Option<usize> {
        self.size
    }

    fn construct<'a>(&self, bytes: &'a [u8]) -> Option<&'a [u8]> {
        match self.size {
            Some(size) if size != bytes.len() => None,
            _ => Some(bytes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Dotted;

    impl CompositeCodec for Dotted {
        fn static_size(&self) -> Option<usize> {
            Some(4)
        }

        fn format(&self, bytes: &[u8], f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}.{}.{}.{}", bytes[0], bytes[1], bytes[2], bytes[3])
        }
    }

    struct Rendered<'a>(&'a CompositeRef, &'a [u8]);

    impl fmt::Display for Rendered<'_> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            self.0.codec().format(self.1, f)
        }
    }

    #[test]
    fn test_closures_are_capabilities() {
        let skip = PositionFn::new("skip_padding", |_: &[u8], default| default + 2);
        let options = SizeFn::new("options_size", |data: &[u8]| data.len() / 2);

        assert_eq!(skip.call(&[], 6), 8);
        assert_eq!(options.call(&[0; 10]), 5);
        assert_eq!(skip.name(), "skip_padding");
    }

    #[test]
    fn test_equality_is_by_name() {
        let a = SizeFn::new("len", |_: &[u8]| 1);
        let b = SizeFn::new("len", |_: &[u8]| 2);
        let c = SizeFn::new("other", |_: &[u8]| 1);

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_byte_array_codec() {
        let mac = CompositeRef::new("HardwareAddress", ByteArrayCodec::fixed(6));
        let bytes = [0x00, 0x1b, 0x44, 0x11, 0x3a, 0xb7];

        assert_eq!(mac.static_size(), Some(6));
        assert_eq!(mac.codec().construct(&bytes), Some(&bytes[..]));
        assert_eq!(mac.codec().construct(&bytes[..4]), None);
        assert_eq!(Rendered(&mac, &bytes).to_string(), "00:1b:44:11:3a:b7");

        let mut out = [0u8; 6];
        assert!(mac.codec().copy_into(&bytes, &mut out));
        assert_eq!(out, bytes);
        assert!(!mac.codec().copy_into(&bytes[..2], &mut out));
    }

    #[test]
    fn test_custom_format() {
        let address = CompositeRef::new("IpAddress", Dotted);
        assert_eq!(Rendered(&address, &[10, 0, 0, 1]).to_string(), "10.0.0.1");
    }
}
