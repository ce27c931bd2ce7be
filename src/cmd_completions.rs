use zfs_exporter_operator::completions::{self, CompletionShell};

use crate::args::Cli;

pub(crate) fn cmd_completions(shell: CompletionShell) {
    completions::generate_completions::<Cli>(shell, "zfs-exporter-operator");
}
