use nalgebra::{Vector2, Vector3, Vector4};

/// A typed source table for one per-corner attribute channel.
///
/// Each channel owns its table outright; triangles reference entries
/// by index only, and distinct channels are fully independent.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeTable {
    // UV texture coordinates, typically 0.0 - 1.0
    Uv(Vec<Vector2<f64>>),

    // A normal vector
    Normal(Vec<Vector3<f64>>),

    // RGBA color
    Color(Vec<Vector4<u8>>),
}

/// A single entry of an [`AttributeTable`], used where the progressive
/// mesh stream carries a source value inline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AttributeValue {
    Uv(Vector2<f64>),
    Normal(Vector3<f64>),
    Color(Vector4<u8>),
}

impl AttributeTable {
    pub fn len(&self) -> usize {
        match self {
            AttributeTable::Uv(v) => v.len(),
            AttributeTable::Normal(v) => v.len(),
            AttributeTable::Color(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn value_at(&self, index: usize) -> AttributeValue {
        match self {
            AttributeTable::Uv(v) => AttributeValue::Uv(v[index]),
            AttributeTable::Normal(v) => AttributeValue::Normal(v[index]),
            AttributeTable::Color(v) => AttributeValue::Color(v[index]),
        }
    }

    /// Append a value, which must match the table variant.
    pub fn push_value(&mut self, value: AttributeValue) {
        match (self, value) {
            (AttributeTable::Uv(v), AttributeValue::Uv(x)) => v.push(x),
            (AttributeTable::Normal(v), AttributeValue::Normal(x)) => v.push(x),
            (AttributeTable::Color(v), AttributeValue::Color(x)) => v.push(x),
            _ => panic!("attribute value does not match the table variant"),
        }
    }

    pub fn swap(&mut self, a: usize, b: usize) {
        match self {
            AttributeTable::Uv(v) => v.swap(a, b),
            AttributeTable::Normal(v) => v.swap(a, b),
            AttributeTable::Color(v) => v.swap(a, b),
        }
    }

    pub fn pop(&mut self) {
        match self {
            AttributeTable::Uv(v) => {
                v.pop();
            }
            AttributeTable::Normal(v) => {
                v.pop();
            }
            AttributeTable::Color(v) => {
                v.pop();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_ops() {
        let mut table = AttributeTable::Uv(vec![
            Vector2::new(0.0, 0.0),
            Vector2::new(1.0, 0.0),
            Vector2::new(0.0, 1.0),
        ]);
        assert_eq!(table.len(), 3);
        assert_eq!(table.value_at(1), AttributeValue::Uv(Vector2::new(1.0, 0.0)));

        table.swap(0, 2);
        assert_eq!(table.value_at(0), AttributeValue::Uv(Vector2::new(0.0, 1.0)));

        table.pop();
        assert_eq!(table.len(), 2);

        table.push_value(AttributeValue::Uv(Vector2::new(0.5, 0.5)));
        assert_eq!(table.value_at(2), AttributeValue::Uv(Vector2::new(0.5, 0.5)));
    }

    #[test]
    #[should_panic]
    fn test_push_wrong_variant() {
        let mut table = AttributeTable::Uv(vec![]);
        table.push_value(AttributeValue::Normal(Vector3::zeros()));
    }
}
