//! Multipart completion manifest.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::ChunkError;

/// XML namespace of the S3 `CompleteMultipartUpload` document.
pub const S3_NAMESPACE: &str = "http://s3.amazonaws.com/doc/2006-03-01/";

/// Ordered list of uploaded parts and their integrity tags.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionManifest {
    parts: Vec<(usize, String)>,
}

impl CompletionManifest {
    /// Builds a manifest for parts `1..=part_count`.
    ///
    /// Fails with the first missing part number if the tags are not
    /// contiguous from 1.
    pub fn from_etags(
        etags: &BTreeMap<usize, String>,
        part_count: usize,
    ) -> Result<Self, ChunkError> {
        let mut parts = Vec::with_capacity(part_count);
        for number in 1..=part_count {
            let etag = etags.get(&number).ok_or(ChunkError::MissingPart(number))?;
            parts.push((number, etag.clone()));
        }
        Ok(Self { parts })
    }

    /// Parts in ascending part-number order.
    pub fn parts(&self) -> &[(usize, String)] {
        &self.parts
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Renders the `CompleteMultipartUpload` XML body.
    ///
    /// Tags are echoed byte for byte; only `&`, `<` and `>` are escaped so
    /// the quoted ETag form survives untouched.
    pub fn to_xml(&self) -> String {
        let mut xml = format!(r#"<CompleteMultipartUpload xmlns="{S3_NAMESPACE}">"#);
        for (number, etag) in &self.parts {
            let _ = write!(
                xml,
                "<Part><PartNumber>{number}</PartNumber><ETag>{}</ETag></Part>",
                escape_text(etag)
            );
        }
        xml.push_str("</CompleteMultipartUpload>");
        xml
    }
}

fn escape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}
