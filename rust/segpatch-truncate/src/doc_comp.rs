use std::{cmp::Ordering, marker::PhantomData};

use segpatch_config::FieldType;

use crate::{Doc, SortValue};

/// Ordering of [`Doc`]s by a sort value of type `T`.
///
/// Documents without a value sort last in either direction, preceded by NaN
/// values. With `payload` set, the value is weighted by the posting payload
/// before comparing.
#[derive(Debug, Clone, Copy)]
pub struct DocComp<T> {
    desc: bool,
    payload: bool,
    _marker: PhantomData<T>,
}

impl<T: SortValue> DocComp<T> {
    pub fn new(desc: bool, payload: bool) -> DocComp<T> {
        DocComp {
            desc,
            payload,
            _marker: PhantomData,
        }
    }

    pub fn is_desc(&self) -> bool {
        self.desc
    }

    /// True when `a` sorts strictly before `b`.
    pub fn less(&self, a: &Doc, b: &Doc) -> bool {
        match (a.is_null(), b.is_null()) {
            (false, true) => true,
            (true, _) => false,
            (false, false) => match (self.is_nan(a), self.is_nan(b)) {
                (false, true) => true,
                (true, _) => false,
                (false, false) => {
                    let ord = self.compare_values(a, b);
                    if self.desc {
                        ord == Some(Ordering::Greater)
                    } else {
                        ord == Some(Ordering::Less)
                    }
                }
            },
        }
    }

    /// True when both documents carry bit-identical (weighted) values, or are
    /// both null.
    pub fn equal(&self, a: &Doc, b: &Doc) -> bool {
        match (a.is_null(), b.is_null()) {
            (true, true) => true,
            (false, false) => {
                if self.payload {
                    weighted::<T>(a).to_bits() == weighted::<T>(b).to_bits()
                } else {
                    let (va, vb) = (a.value, b.value);
                    va[..size_of::<T>()] == vb[..size_of::<T>()]
                }
            }
            _ => false,
        }
    }

    /// Total order for sorting: `less` first, then doc id.
    pub fn ordering(&self, a: &Doc, b: &Doc) -> Ordering {
        if self.less(a, b) {
            Ordering::Less
        } else if self.less(b, a) {
            Ordering::Greater
        } else {
            let (da, db) = (a.doc_id, b.doc_id);
            da.cmp(&db)
        }
    }

    fn is_nan(&self, doc: &Doc) -> bool {
        if self.payload {
            weighted::<T>(doc).is_nan()
        } else {
            doc.value_as::<T>().to_f64().is_nan()
        }
    }

    fn compare_values(&self, a: &Doc, b: &Doc) -> Option<Ordering> {
        if self.payload {
            weighted::<T>(a).partial_cmp(&weighted::<T>(b))
        } else {
            a.value_as::<T>().partial_cmp(&b.value_as::<T>())
        }
    }
}

fn weighted<T: SortValue>(doc: &Doc) -> f64 {
    let payload = doc.payload;
    doc.value_as::<T>().to_f64() * payload as f64
}

/// A [`DocComp`] for any numeric attribute type.
#[derive(Debug, Clone, Copy)]
pub enum DocCompKind {
    Int8(DocComp<i8>),
    UInt8(DocComp<u8>),
    Int16(DocComp<i16>),
    UInt16(DocComp<u16>),
    Int32(DocComp<i32>),
    UInt32(DocComp<u32>),
    Int64(DocComp<i64>),
    UInt64(DocComp<u64>),
    Float(DocComp<f32>),
    Double(DocComp<f64>),
}

macro_rules! dispatch {
    ($self:expr, $comp:ident => $body:expr) => {
        match $self {
            DocCompKind::Int8($comp) => $body,
            DocCompKind::UInt8($comp) => $body,
            DocCompKind::Int16($comp) => $body,
            DocCompKind::UInt16($comp) => $body,
            DocCompKind::Int32($comp) => $body,
            DocCompKind::UInt32($comp) => $body,
            DocCompKind::Int64($comp) => $body,
            DocCompKind::UInt64($comp) => $body,
            DocCompKind::Float($comp) => $body,
            DocCompKind::Double($comp) => $body,
        }
    };
}

impl DocCompKind {
    /// Comparator for a sort attribute type; `None` for non-numeric types.
    pub fn new(field_type: FieldType, desc: bool, payload: bool) -> Option<DocCompKind> {
        let comp = match field_type {
            FieldType::Int8 => DocCompKind::Int8(DocComp::new(desc, payload)),
            FieldType::UInt8 => DocCompKind::UInt8(DocComp::new(desc, payload)),
            FieldType::Int16 => DocCompKind::Int16(DocComp::new(desc, payload)),
            FieldType::UInt16 => DocCompKind::UInt16(DocComp::new(desc, payload)),
            FieldType::Int32 => DocCompKind::Int32(DocComp::new(desc, payload)),
            FieldType::UInt32 => DocCompKind::UInt32(DocComp::new(desc, payload)),
            FieldType::Int64 => DocCompKind::Int64(DocComp::new(desc, payload)),
            FieldType::UInt64 => DocCompKind::UInt64(DocComp::new(desc, payload)),
            FieldType::Float => DocCompKind::Float(DocComp::new(desc, payload)),
            FieldType::Double => DocCompKind::Double(DocComp::new(desc, payload)),
            FieldType::String => return None,
        };
        Some(comp)
    }

    pub fn less(&self, a: &Doc, b: &Doc) -> bool {
        dispatch!(self, comp => comp.less(a, b))
    }

    pub fn equal(&self, a: &Doc, b: &Doc) -> bool {
        dispatch!(self, comp => comp.equal(a, b))
    }

    pub fn ordering(&self, a: &Doc, b: &Doc) -> Ordering {
        dispatch!(self, comp => comp.ordering(a, b))
    }

    /// Sorts best first.
    pub fn sort(&self, docs: &mut [Doc]) {
        dispatch!(self, comp => docs.sort_unstable_by(|a, b| comp.ordering(a, b)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nulls_sort_last_in_both_directions() {
        let mut rng = fastrand::Rng::with_seed(11);
        for desc in [false, true] {
            for payload in [false, true] {
                let comp = DocComp::<i32>::new(desc, payload);
                let docs = (0..200)
                    .map(|i| {
                        if rng.u8(..3) == 0 {
                            Doc::null(i, rng.f32())
                        } else {
                            Doc::with_value(i, rng.i32(-1000..1000), rng.f32())
                        }
                    })
                    .collect::<Vec<_>>();
                for a in docs.iter().filter(|d| !d.is_null()) {
                    for b in docs.iter().filter(|d| d.is_null()) {
                        assert!(comp.less(a, b));
                        assert!(!comp.less(b, a));
                    }
                }
                let null = Doc::null(1, 1.0);
                assert!(!comp.less(&null, &null));
                assert!(comp.equal(&null, &null));
            }
        }
    }

    #[test]
    fn test_payload_weighting() {
        let v1 = Doc::with_value(1, 3.0f32, 2.0);
        let v2 = Doc::with_value(2, 5.0f32, 2.0);
        let asc = DocComp::<f32>::new(false, true);
        assert!(asc.less(&v1, &v2));
        assert!(!asc.less(&v2, &v1));
        let desc = DocComp::<f32>::new(true, true);
        assert!(desc.less(&v2, &v1));
        assert!(!desc.less(&v1, &v2));

        // 3 * 2.0 == 6 * 1.0 once weighted
        let w1 = Doc::with_value(3, 3i64, 2.0);
        let w2 = Doc::with_value(4, 6i64, 1.0);
        let weighted = DocComp::<i64>::new(false, true);
        assert!(weighted.equal(&w1, &w2));
        assert!(!weighted.less(&w1, &w2) && !weighted.less(&w2, &w1));
        let raw = DocComp::<i64>::new(false, false);
        assert!(!raw.equal(&w1, &w2));
        assert!(raw.less(&w1, &w2));
    }

    #[test]
    fn test_kind_dispatch_and_sort() {
        assert!(DocCompKind::new(FieldType::String, false, false).is_none());
        let comp = DocCompKind::new(FieldType::UInt16, true, false).unwrap();
        let mut docs = vec![
            Doc::with_value(1, 5u16, 1.0),
            Doc::null(2, 1.0),
            Doc::with_value(3, 9u16, 1.0),
            Doc::with_value(4, 5u16, 1.0),
        ];
        comp.sort(&mut docs);
        let ids = docs.iter().map(|d| d.doc_id).collect::<Vec<_>>();
        assert_eq!(ids, vec![3, 1, 4, 2]);
        assert!(comp.equal(&docs[1], &docs[2]));
    }

    #[test]
    fn test_nan_sorts_between_values_and_nulls() {
        let nan = Doc::with_value(1, f32::NAN, 1.0);
        let value = Doc::with_value(2, 1.5f32, 1.0);
        let null = Doc::null(3, 1.0);
        for desc in [false, true] {
            let comp = DocComp::<f32>::new(desc, false);
            assert!(comp.less(&value, &nan) && !comp.less(&nan, &value));
            assert!(comp.less(&nan, &null) && !comp.less(&null, &nan));
            assert!(!comp.less(&nan, &nan));
            assert!(comp.equal(&nan, &nan));
        }

        // 0 * inf is NaN once weighted
        let inf = Doc::with_value(4, f64::INFINITY, 0.0);
        let weighted = DocComp::<f64>::new(true, true);
        let finite = Doc::with_value(5, -7.0f64, 1.0);
        assert!(weighted.less(&finite, &inf));
        assert!(!weighted.less(&inf, &finite));
    }
}
