//! Grub configuration rewriting
//!
//! Turns the ISO's `EFI/BOOT/grub.cfg` into one that boots unattended on a
//! serial-only VM: fixed ESP search label, one-unit menu timeout, first entry
//! as default, serial terminal instead of video, kickstart boot arguments on
//! the stage2 line and every `LABEL=` reference pointed at the data partition.
//!
//! Rule order matters. The stage2 rule appends `LABEL=INSTALLER` text that
//! the final label rule must leave intact, and the label rule rewrites the
//! stage2 line's original label that the ESP rule never touches.

use crate::config::defaults;
use crate::core::patch::{PatchOutcome, Rewrite, RewriteRule, TextPatcher};
use crate::error::PatchError;

/// Names of the grub rewrite rules, in application order
pub mod rules {
    pub const ESP_SEARCH_LABEL: &str = "esp-search-label";
    pub const MENU_TIMEOUT: &str = "menu-timeout";
    pub const DEFAULT_ENTRY: &str = "default-entry";
    pub const SERIAL_CONSOLE: &str = "serial-console";
    pub const STAGE2_ARGS: &str = "stage2-boot-args";
    pub const VOLUME_LABELS: &str = "volume-labels";
}

/// Kernel arguments appended to the stage2 line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootArgs {
    /// Kickstart file name at the root of the data partition
    pub kickstart_name: String,
    /// Volume label of the data partition
    pub data_label: String,
    /// Serial console speed
    pub serial_baud: u32,
    /// Let the installer keep its logs in the installed image
    pub save_logs: bool,
}

impl BootArgs {
    pub fn new(save_logs: bool) -> Self {
        Self {
            kickstart_name: "ks.cfg".to_string(),
            data_label: defaults::INSTALLER_LABEL.to_string(),
            serial_baud: defaults::SERIAL_BAUD,
            save_logs,
        }
    }

    /// Render the space-separated argument string
    pub fn render(&self) -> String {
        let mut args = vec![
            "inst.text".to_string(),
            format!("inst.ks=hd:LABEL={}:/{}", self.data_label, self.kickstart_name),
            format!("console=ttyS0,{}n8", self.serial_baud),
            "inst.gpt".to_string(),
            "inst.loglevel=debug".to_string(),
        ];

        // Keep installer logs out of the final image unless asked to save them.
        if !self.save_logs {
            args.push("inst.nosave=all".to_string());
        }

        args.join(" ")
    }
}

/// Assembles the grub rewrite rules
#[derive(Debug, Clone)]
pub struct BootConfigBuilder {
    esp_label: String,
    source_label_prefix: String,
    menu_timeout: u32,
    args: BootArgs,
}

impl BootConfigBuilder {
    pub fn new(save_logs: bool) -> Self {
        Self {
            esp_label: defaults::ESP_LABEL.to_string(),
            source_label_prefix: defaults::SOURCE_LABEL_PREFIX.to_string(),
            menu_timeout: defaults::MENU_TIMEOUT,
            args: BootArgs::new(save_logs),
        }
    }

    /// Serial console speed for both grub and the kernel
    #[must_use]
    pub fn with_serial_baud(mut self, baud: u32) -> Self {
        self.args.serial_baud = baud;
        self
    }

    /// Label prefix the ISO's own `search -l` line uses
    #[must_use]
    pub fn with_source_label_prefix(mut self, prefix: &str) -> Self {
        self.source_label_prefix = prefix.to_string();
        self
    }

    /// Kickstart file name as staged on the data partition
    #[must_use]
    pub fn with_kickstart_name(mut self, name: &str) -> Self {
        self.args.kickstart_name = name.to_string();
        self
    }

    pub fn boot_args(&self) -> &BootArgs {
        &self.args
    }

    /// Grub commands replacing each `load_video` line
    pub fn serial_block(&self) -> String {
        format!(
            "serial --speed={} --unit=0 --word=8 --parity=no --stop=1\n\
             terminal_input serial\n\
             terminal_output serial\n",
            self.args.serial_baud
        )
    }

    /// Build the ordered rule list
    pub fn patcher(&self) -> Result<TextPatcher, PatchError> {
        let args = self.args.render();

        let stage2 = RewriteRule::new(
            rules::STAGE2_ARGS,
            r"inst\.stage2.*",
            Rewrite::With(Box::new(move |caps: &regex::Captures<'_>| {
                let directive = &caps[0];
                if directive.ends_with(&args) {
                    directive.to_string()
                } else {
                    format!("{directive} {args}")
                }
            })),
        )?;

        Ok(TextPatcher::new()
            .rule(RewriteRule::literal(
                rules::ESP_SEARCH_LABEL,
                &format!("-l .{}.*", regex::escape(&self.source_label_prefix)),
                &format!("-l '{}'", self.esp_label),
            )?)
            .rule(RewriteRule::literal(
                rules::MENU_TIMEOUT,
                &format!(r"\btimeout={}\b", defaults::SOURCE_MENU_TIMEOUT),
                &format!("timeout={}", self.menu_timeout),
            )?)
            .rule(RewriteRule::literal(
                rules::DEFAULT_ENTRY,
                "set default=.*",
                "set default=\"0\"",
            )?)
            .rule(RewriteRule::literal(
                rules::SERIAL_CONSOLE,
                "load_video\n",
                &self.serial_block(),
            )?)
            .rule(stage2)
            .rule(RewriteRule::literal(
                rules::VOLUME_LABELS,
                r"LABEL=[^\s:]+",
                &format!("LABEL={}", self.args.data_label),
            )?))
    }

    /// Rewrite a grub configuration document
    pub fn patch(&self, text: &str) -> Result<PatchOutcome, PatchError> {
        Ok(self.patcher()?.apply(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RHEL_GRUB_CFG: &str = "\
set default=\"1\"

function load_video {
  insmod efi_gop
  insmod efi_uga
}

load_video
set gfxpayload=keep
insmod gzio
insmod part_gpt
insmod ext2

set timeout=60
### END /etc/grub.d/00_header ###

search --no-floppy --set=root -l 'RHEL-8-4-0-BaseOS-x86_64'

### BEGIN /etc/grub.d/10_linux ###
menuentry 'Install Red Hat Enterprise Linux 8.4' --class fedora --class gnu-linux --class gnu --class os {
\tlinuxefi /images/pxeboot/vmlinuz inst.stage2=hd:LABEL=RHEL-8-4-0-BaseOS-x86_64 quiet
\tinitrdefi /images/pxeboot/initrd.img
}
menuentry 'Test this media & install Red Hat Enterprise Linux 8.4' --class fedora --class gnu-linux --class gnu --class os {
\tlinuxefi /images/pxeboot/vmlinuz inst.stage2=hd:LABEL=RHEL-8-4-0-BaseOS-x86_64 rd.live.check quiet
\tinitrdefi /images/pxeboot/initrd.img
}
";

    const ARGS_NOSAVE: &str = "inst.text inst.ks=hd:LABEL=INSTALLER:/ks.cfg \
console=ttyS0,38400n8 inst.gpt inst.loglevel=debug inst.nosave=all";

    #[test]
    fn test_boot_args_without_save_logs() {
        assert_eq!(BootArgs::new(false).render(), ARGS_NOSAVE);
    }

    #[test]
    fn test_boot_args_with_save_logs() {
        let args = BootArgs::new(true).render();
        assert_eq!(
            args,
            "inst.text inst.ks=hd:LABEL=INSTALLER:/ks.cfg console=ttyS0,38400n8 inst.gpt inst.loglevel=debug"
        );
        assert!(!args.contains("inst.nosave"));
    }

    #[test]
    fn test_rule_order() {
        let patcher = BootConfigBuilder::new(false).patcher().unwrap();
        let names: Vec<&str> = patcher.rules().iter().map(RewriteRule::name).collect();
        assert_eq!(
            names,
            vec![
                rules::ESP_SEARCH_LABEL,
                rules::MENU_TIMEOUT,
                rules::DEFAULT_ENTRY,
                rules::SERIAL_CONSOLE,
                rules::STAGE2_ARGS,
                rules::VOLUME_LABELS,
            ]
        );
    }

    #[test]
    fn test_full_patch() {
        let outcome = BootConfigBuilder::new(false).patch(RHEL_GRUB_CFG).unwrap();
        let cfg = &outcome.patched;

        assert!(cfg.contains("search --no-floppy --set=root -l 'ESP'\n"));
        assert!(cfg.contains("set timeout=1\n"));
        assert!(!cfg.contains("timeout=60"));
        assert!(cfg.starts_with("set default=\"0\"\n"));
        assert!(cfg.contains(
            "\nserial --speed=38400 --unit=0 --word=8 --parity=no --stop=1\n\
             terminal_input serial\nterminal_output serial\nset gfxpayload=keep\n"
        ));
        // The function definition line is not a bare `load_video` line.
        assert!(cfg.contains("function load_video {\n"));
        assert!(cfg.contains(&format!(
            "\tlinuxefi /images/pxeboot/vmlinuz inst.stage2=hd:LABEL=INSTALLER quiet {ARGS_NOSAVE}\n"
        )));
        assert!(cfg.contains(&format!(
            "inst.stage2=hd:LABEL=INSTALLER rd.live.check quiet {ARGS_NOSAVE}\n"
        )));
        assert!(!cfg.contains("RHEL-8-4-0"));
        assert!(outcome.unmatched_rules().is_empty());
    }

    #[test]
    fn test_stage2_rule_matched_per_entry() {
        let outcome = BootConfigBuilder::new(true).patch(RHEL_GRUB_CFG).unwrap();
        let stage2 = outcome
            .reports
            .iter()
            .find(|r| r.rule == rules::STAGE2_ARGS)
            .unwrap();
        assert_eq!(stage2.matches, 2);
        assert!(!outcome.patched.contains("inst.nosave=all"));
    }

    #[test]
    fn test_second_pass_is_a_no_op() {
        let builder = BootConfigBuilder::new(false);
        let first = builder.patch(RHEL_GRUB_CFG).unwrap();
        let second = builder.patch(&first.patched).unwrap();

        assert_eq!(first.patched, second.patched);
        assert!(!second.changed());
    }

    #[test]
    fn test_label_rule_keeps_kickstart_path() {
        let outcome = BootConfigBuilder::new(false)
            .patch("linux vmlinuz inst.stage2=hd:LABEL=CentOS-8\\x20x86_64 inst.repo=hd:LABEL=OTHER:/repo\n")
            .unwrap();

        assert!(outcome.patched.contains("inst.stage2=hd:LABEL=INSTALLER inst.repo=hd:LABEL=INSTALLER:/repo"));
        assert!(outcome.patched.contains("inst.ks=hd:LABEL=INSTALLER:/ks.cfg"));
    }

    #[test]
    fn test_custom_baud_reaches_grub_and_kernel() {
        let outcome = BootConfigBuilder::new(false)
            .with_serial_baud(115_200)
            .patch(RHEL_GRUB_CFG)
            .unwrap();

        assert!(outcome.patched.contains("serial --speed=115200 "));
        assert!(outcome.patched.contains("console=ttyS0,115200n8"));
    }

    #[test]
    fn test_custom_source_label_prefix_is_escaped() {
        let outcome = BootConfigBuilder::new(false)
            .with_source_label_prefix("Rocky-8.4")
            .patch("search --no-floppy --set=root -l 'Rocky-8.4-x86_64-dvd'\nsearch -l 'Rocky-844'\n")
            .unwrap();

        assert!(outcome.patched.starts_with("search --no-floppy --set=root -l 'ESP'\n"));
        // '.' is literal, so "Rocky-844" is left alone.
        assert!(outcome.patched.contains("search -l 'Rocky-844'"));
    }

    #[test]
    fn test_timeout_rule_does_not_touch_longer_values() {
        let outcome = BootConfigBuilder::new(false)
            .patch("set timeout=600\n")
            .unwrap();
        assert_eq!(outcome.patched, "set timeout=600\n");
    }

    #[test]
    fn test_missing_directives_are_no_ops() {
        let outcome = BootConfigBuilder::new(false).patch("# empty\n").unwrap();
        assert_eq!(outcome.patched, "# empty\n");
        assert_eq!(outcome.unmatched_rules().len(), 6);
    }
}
