use std::cmp::Ordering;
use std::fmt::{self, Debug, Display, Formatter};
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// A zero-based index into one specific array, tagged so that a plane index
/// can't be handed to something expecting a face index.
pub struct TypedIndex<X>(u32, PhantomData<X>);

impl<X> TypedIndex<X> {
    pub fn new(index: usize) -> Self {
        Self(index as u32, PhantomData)
    }
    pub fn from_raw(raw: u32) -> Self {
        Self(raw, PhantomData)
    }
    pub fn index(self) -> usize {
        self.0 as usize
    }
    pub fn raw(self) -> u32 {
        self.0
    }
    /// True when this index addresses an element of an array of `count` items.
    pub fn within(self, count: usize) -> bool {
        self.index() < count
    }
}

impl<X> Copy for TypedIndex<X> {}

impl<X> Clone for TypedIndex<X> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<X> PartialEq for TypedIndex<X> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl<X> Eq for TypedIndex<X> {}

impl<X> PartialOrd for TypedIndex<X> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<X> Ord for TypedIndex<X> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl<X> Hash for TypedIndex<X> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl<X> From<u32> for TypedIndex<X> {
    fn from(raw: u32) -> Self {
        Self::from_raw(raw)
    }
}

impl<X> Debug for TypedIndex<X> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let tag = std::any::type_name::<X>();
        let tag = tag.rsplit("::").next().unwrap_or(tag);
        write!(f, "{}({})", tag.trim_start_matches('_'), self.0)
    }
}

impl<X> Display for TypedIndex<X> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug)]
pub struct TypedEnumerate<I, X> {
    iter: I,
    count: u32,
    _tag: PhantomData<X>,
}

impl<I, X> Iterator for TypedEnumerate<I, X>
where
    I: Iterator,
{
    type Item = (TypedIndex<X>, <I as Iterator>::Item);

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.iter.next()?;
        let index = TypedIndex::from_raw(self.count);
        self.count += 1;
        Some((index, item))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.iter.size_hint()
    }
}

/// `enumerate()` that yields typed indices.
pub trait TypedEnum: Iterator + Sized {
    fn typed_enumerate<X>(self) -> TypedEnumerate<Self, X> {
        TypedEnumerate {
            iter: self,
            count: 0,
            _tag: PhantomData,
        }
    }
}

impl<I: Iterator> TypedEnum for I {}

#[macro_export]
macro_rules! typed_index {
    ($name:ident, $tag:ident) => {
        #[derive(Debug, Clone, Copy, Eq, Ord, PartialOrd, PartialEq, Hash)]
        pub enum $tag {}
        pub type $name = $crate::TypedIndex<$tag>;
    };
}
