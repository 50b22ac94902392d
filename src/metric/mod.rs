//! Metric capabilities supplied by the caller.
//!
//! The index never looks inside an object: it stores the bytes the object
//! serialises to and compares objects only through the caller's distance
//! function. Both capabilities are passed as plain values (closures work
//! for distance functions), not through inheritance.

/// An indexable object: opaque to the tree, self-describing on the wire.
///
/// `decode(o.encode()) ≡ o` must hold under the caller's equality, and the
/// same object must always produce identical bytes.
pub trait Object: Clone {
    /// Byte count `encode` will produce
    fn encoded_size(&self) -> usize;

    /// Serialise to contiguous bytes
    fn encode(&self) -> Vec<u8>;

    /// Reconstruct from bytes previously produced by `encode`
    fn decode(bytes: &[u8]) -> Option<Self>
    where
        Self: Sized;
}

/// A metric distance: non-negative, finite, symmetric and triangular.
///
/// Identity of indiscernibles is preferred but not relied on.
pub trait DistanceFunction<O> {
    /// Distance between two objects
    fn distance(&self, a: &O, b: &O) -> f64;
}

impl<O, F> DistanceFunction<O> for F
where
    F: Fn(&O, &O) -> f64,
{
    fn distance(&self, a: &O, b: &O) -> f64 {
        self(a, b)
    }
}
