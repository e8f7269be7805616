//! Request documents parsed from XML bodies.

use crate::types::{CompletedPart, ObjectIdentifier};

/// `<Delete>` body of a batch delete.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteRequest {
    /// Keys to remove.
    pub objects: Vec<ObjectIdentifier>,
    /// Omit successful entries from the response.
    pub quiet: bool,
}

/// `<CompleteMultipartUpload>` body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompleteMultipartUploadRequest {
    /// Parts in the order the client listed them.
    pub parts: Vec<CompletedPart>,
}

impl CompleteMultipartUploadRequest {
    /// Whether part numbers are strictly increasing.
    #[must_use]
    pub fn parts_strictly_increasing(&self) -> bool {
        self.parts
            .windows(2)
            .all(|w| w[0].part_number < w[1].part_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(numbers: &[u32]) -> CompleteMultipartUploadRequest {
        CompleteMultipartUploadRequest {
            parts: numbers
                .iter()
                .map(|n| CompletedPart {
                    part_number: *n,
                    etag: String::new(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_should_accept_increasing_parts() {
        assert!(request(&[1, 2, 3]).parts_strictly_increasing());
        assert!(request(&[1, 3]).parts_strictly_increasing());
        assert!(request(&[]).parts_strictly_increasing());
    }

    #[test]
    fn test_should_reject_unordered_or_repeated_parts() {
        assert!(!request(&[2, 1, 3]).parts_strictly_increasing());
        assert!(!request(&[1, 1]).parts_strictly_increasing());
    }
}
