//! User capabilities supplied per engine call
//!
//! Every capability is a trait resolved at compile time. Implementations run
//! inside kernels, concurrently and on shared references, hence the `Sync`
//! bounds.

/// Per-edge push rule used by the mailbox protocol and level-synchronous
/// traversals
///
/// `update` results race when several sources reach one destination in the
/// same launch. Implementations must return the same value for every racer
/// (as a BFS level does), otherwise the outcome depends on scheduling.
pub trait EdgeContext<V>: Sync {
    /// Whether the destination's current value may be overwritten
    fn cond(&self, current: V) -> bool;

    /// New destination value derived from the source value
    fn update(&self, source: V) -> V;
}

/// Wire encoding of vertex values crossing a partition boundary
pub trait MessageContext<V, M>: Sync {
    /// Encode a source value for the outbox
    fn pack(&self, value: V) -> M;

    /// Decode an inbox value
    fn unpack(&self, wire: M) -> V;
}

/// Sends values unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityMessage;

impl<V> MessageContext<V, V> for IdentityMessage {
    fn pack(&self, value: V) -> V {
        value
    }

    fn unpack(&self, wire: V) -> V {
        wire
    }
}

/// In-place value transform for `vertex_map` and `edge_map`
pub trait Functor<T>: Sync {
    /// Map one value
    fn call(&self, value: T) -> T;
}

impl<T, F> Functor<T> for F
where
    F: Fn(T) -> T + Sync,
{
    fn call(&self, value: T) -> T {
        self(value)
    }
}

/// Gather rule for `edge_filter`
pub trait EdgeFilter<V, E, A>: Sync {
    /// Contribution of one edge, or `None` to skip it
    fn gather(&self, source: V, edge: E, destination: V) -> Option<A>;

    /// Merge a contribution into the destination accumulator
    ///
    /// Accumulators start at the all-zero value, which must act as the
    /// identity. Must be commutative and associative for the result to be
    /// independent of scheduling.
    fn combine(&self, current: A, contribution: A) -> A;
}

/// Apply rule for `vertex_filter`
pub trait VertexFilter<V, A>: Sync {
    /// New vertex value from the old one and its accumulator
    fn apply(&self, value: V, accumulated: A) -> V;

    /// Whether the vertex joins the output frontier
    fn is_active(&self, old: V, new: V) -> bool;
}

/// Host-side fold used by `vertex_reduce`
pub trait Reducible<A> {
    /// Fold this value into `accumulator`
    fn reduce(&self, accumulator: &mut A);
}

macro_rules! impl_sum_reducible {
    ($($t:ty),*) => {
        $(
            impl Reducible<$t> for $t {
                fn reduce(&self, accumulator: &mut $t) {
                    *accumulator += *self;
                }
            }
        )*
    };
}

impl_sum_reducible!(u32, u64, i32, i64, f32, f64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_is_functor() {
        let double = |x: u32| x * 2;
        assert_eq!(Functor::call(&double, 21), 42);
    }

    #[test]
    fn test_identity_message() {
        let wire: f32 = IdentityMessage.pack(0.5_f32);
        let value: f32 = IdentityMessage.unpack(wire);
        assert_eq!(value, 0.5);
    }

    #[test]
    fn test_primitive_reduce_sums() {
        let mut total = 0_u64;
        for v in [3_u64, 4, 5] {
            v.reduce(&mut total);
        }
        assert_eq!(total, 12);
    }
}
