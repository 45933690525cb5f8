//! NVMe id helper rewriting
//!
//! `google_nvme_id` reads the vendor-specific bytes of the namespace
//! identification page with `xxd -p -seek N | xxd -p -r`. The installer
//! environment ships no `xxd`, so the pipeline is swapped for `dd`, which
//! emits the same bytes from the same offset. Already-patched scripts no
//! longer contain the pipeline, so the rewrite is a no-op on them.

use crate::config::defaults;
use crate::core::patch::{PatchOutcome, RewriteRule, TextPatcher};
use crate::error::PatchError;

/// Name of the single rewrite rule
pub const RULE_NAME: &str = "xxd-to-dd";

/// Assembles the NVMe id helper rewrite rule
#[derive(Debug, Clone, Copy)]
pub struct DeviceIdPatcher {
    offset: u32,
}

impl DeviceIdPatcher {
    pub fn new() -> Self {
        Self {
            offset: defaults::NVME_ID_OFFSET,
        }
    }

    /// Byte offset the helper reads from
    #[must_use]
    pub fn with_offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }

    /// The `xxd` pipeline being replaced, as a regex
    pub fn pattern(&self) -> String {
        format!(r"xxd -p -seek {} \| xxd -p -r", self.offset)
    }

    /// The direct byte-range read replacing it
    pub fn replacement(&self) -> String {
        format!("dd bs=1 skip={} 2>/dev/null", self.offset)
    }

    pub fn patcher(&self) -> Result<TextPatcher, PatchError> {
        Ok(TextPatcher::new().rule(RewriteRule::literal(
            RULE_NAME,
            &self.pattern(),
            &self.replacement(),
        )?))
    }

    /// Rewrite a helper script
    pub fn patch(&self, text: &str) -> Result<PatchOutcome, PatchError> {
        Ok(self.patcher()?.apply(text))
    }
}

impl Default for DeviceIdPatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NVME_ID_SCRIPT: &str = r#"#!/bin/bash
function get_namespace_device_name() {
  local nvme_json
  nvme_json="$("$nvme_cli_bin" id-ns -b "$1" | xxd -p -seek 384 | xxd -p -r)"
  if [[ $? -ne 0 ]]; then
    return 1
  fi
  echo "$nvme_json"
}
"#;

    #[test]
    fn test_pipeline_replaced_once() {
        let outcome = DeviceIdPatcher::new().patch(NVME_ID_SCRIPT).unwrap();

        assert_eq!(outcome.reports[0].matches, 1);
        assert!(outcome.patched.contains(
            r#"nvme_json="$("$nvme_cli_bin" id-ns -b "$1" | dd bs=1 skip=384 2>/dev/null)""#
        ));
        assert!(!outcome.patched.contains("xxd"));
    }

    #[test]
    fn test_patch_is_idempotent() {
        let patcher = DeviceIdPatcher::new();
        let once = patcher.patch(NVME_ID_SCRIPT).unwrap().patched;
        let twice = patcher.patch(&once).unwrap();

        assert_eq!(twice.patched, once);
        assert_eq!(twice.reports[0].matches, 0);
    }

    #[test]
    fn test_other_offsets_untouched() {
        let script = "id-ns -b /dev/nvme0n1 | xxd -p -seek 512 | xxd -p -r\n";
        let outcome = DeviceIdPatcher::new().patch(script).unwrap();
        assert_eq!(outcome.patched, script);
    }

    #[test]
    fn test_custom_offset() {
        let script = "id-ns -b /dev/nvme0n1 | xxd -p -seek 512 | xxd -p -r\n";
        let outcome = DeviceIdPatcher::new().with_offset(512).patch(script).unwrap();
        assert_eq!(outcome.patched, "id-ns -b /dev/nvme0n1 | dd bs=1 skip=512 2>/dev/null\n");
    }
}
