/// Flags that select a variant of an encoding routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EncodingOptions {
    /// Pad every value to a multiple of 32 bytes.
    pub padded: bool,
    /// Write dynamic data in place, without head/tail indirection (packed mode).
    pub dynamic_inplace: bool,
    /// External function values arrive as two stack words (address, selector).
    pub encode_function_from_stack: bool,
    /// Encode storage references as their slot (library calls).
    pub encode_as_library_types: bool,
}

impl Default for EncodingOptions {
    fn default() -> Self {
        Self {
            padded: true,
            dynamic_inplace: false,
            encode_function_from_stack: true,
            encode_as_library_types: false,
        }
    }
}

impl EncodingOptions {
    /// Standard ABI encoding of stack values.
    pub fn standard(encode_as_library_types: bool) -> Self {
        Self {
            encode_as_library_types,
            ..Self::default()
        }
    }

    /// `abi.encodePacked` of stack values.
    pub fn packed() -> Self {
        Self {
            padded: false,
            dynamic_inplace: true,
            ..Self::default()
        }
    }

    /// Options for elements and members nested inside another value.
    pub(crate) fn nested(self) -> Self {
        Self {
            encode_function_from_stack: false,
            padded: true,
            ..self
        }
    }

    /// Readable name suffix. Cache keys use the options value itself.
    pub fn suffix(&self) -> String {
        let mut suffix = String::new();
        if !self.padded {
            suffix.push_str("_nonPadded");
        }
        if self.dynamic_inplace {
            suffix.push_str("_inplace");
        }
        if self.encode_function_from_stack {
            suffix.push_str("_fromStack");
        }
        if self.encode_as_library_types {
            suffix.push_str("_library");
        }
        suffix
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffixes() {
        assert_eq!(EncodingOptions::default().suffix(), "_fromStack");
        assert_eq!(EncodingOptions::packed().suffix(), "_nonPadded_inplace_fromStack");
        assert_eq!(
            EncodingOptions::standard(true).nested().suffix(),
            "_library"
        );
    }
}
