use bytemuck::{Pod, Zeroable};

use segpatch_common::DocId;

/// Numeric type a posting list can be sorted by.
pub trait SortValue: Pod + PartialOrd + Send + Sync + 'static {
    fn to_f64(self) -> f64;
}

macro_rules! impl_sort_value {
    ($($t:ty),*) => {
        $(
            impl SortValue for $t {
                #[inline]
                fn to_f64(self) -> f64 {
                    self as f64
                }
            }
        )*
    };
}

impl_sort_value!(i8, i16, i32, i64, u8, u16, u32, u64, f32, f64);

/// One posting with its sort value.
///
/// `value` holds the little-endian bytes of the sort attribute, interpreted by
/// the comparator's type.
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct Doc {
    pub doc_id: DocId,
    pub value: [u8; 8],
    pub payload: f32,
    is_null: u8,
}

impl Doc {
    pub fn new(doc_id: DocId, value: [u8; 8], payload: f32) -> Doc {
        Doc {
            doc_id,
            value,
            payload,
            is_null: 0,
        }
    }

    pub fn with_value<T: SortValue>(doc_id: DocId, value: T, payload: f32) -> Doc {
        let mut bytes = [0u8; 8];
        bytes[..size_of::<T>()].copy_from_slice(bytemuck::bytes_of(&value));
        Doc::new(doc_id, bytes, payload)
    }

    /// A posting whose document has no sort value.
    pub fn null(doc_id: DocId, payload: f32) -> Doc {
        Doc {
            doc_id,
            value: [0; 8],
            payload,
            is_null: 1,
        }
    }

    pub fn is_null(&self) -> bool {
        self.is_null != 0
    }

    pub fn value_as<T: SortValue>(&self) -> T {
        let value = self.value;
        bytemuck::pod_read_unaligned(&value[..size_of::<T>()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_and_values() {
        assert_eq!(size_of::<Doc>(), 17);
        let doc = Doc::with_value(3, -5i16, 1.5);
        assert_eq!(doc.value_as::<i16>(), -5);
        assert!(!doc.is_null());
        let doc = Doc::with_value(4, 2.25f64, 1.0);
        assert_eq!(doc.value_as::<f64>(), 2.25);
        assert!(Doc::null(5, 1.0).is_null());

        let docs = [Doc::with_value(1, 7u32, 0.5), Doc::null(2, 0.5)];
        let bytes: &[u8] = bytemuck::cast_slice(&docs);
        assert_eq!(bytes.len(), 34);
        let back: Vec<Doc> = bytes.chunks(17).map(bytemuck::pod_read_unaligned).collect();
        let id = back[1].doc_id;
        assert_eq!(id, 2);
        assert!(back[1].is_null());
    }
}
