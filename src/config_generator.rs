//! Generates the Icinga2 `CheckCommand` object for this plugin from its
//! actual clap definition, so the monitoring-side configuration can never
//! drift from the options the binary accepts.

use clap::ArgAction;

#[derive(Debug, thiserror::Error)]
pub enum IcingaConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("executable path is not valid UTF-8")]
    InvalidExecutablePath,
    #[error("argument {0} has no long option and cannot be described")]
    MissingLongOption(String),
}

/// An Icinga2 `CheckCommand` description derived from a [`clap::Command`].
#[derive(Debug)]
pub struct CheckCommand {
    name: String,
    args: Vec<CommandArg>,
}

#[derive(Debug)]
struct CommandArg {
    long: String,
    var: String,
    help: Option<String>,
    is_switch: bool,
    required: bool,
    default: Option<String>,
}

impl CheckCommand {
    /// Describes every long option of `cmd`. Custom-variable names are
    /// `<var_prefix>_<long>` with dashes folded to underscores. The
    /// built-in `--help`/`--version` arguments are left out.
    pub fn from_clap(
        name: &str,
        var_prefix: &str,
        cmd: &clap::Command,
    ) -> Result<Self, IcingaConfigError> {
        let mut args = Vec::new();

        for arg in cmd.get_arguments() {
            if matches!(arg.get_id().as_str(), "help" | "version") {
                continue;
            }

            let long = arg
                .get_long()
                .ok_or_else(|| IcingaConfigError::MissingLongOption(arg.get_id().to_string()))?
                .to_owned();

            let var = format!("{}_{}", var_prefix, long.replace('-', "_"));
            let help = arg.get_help().map(|h| h.to_string());
            let is_switch = matches!(
                arg.get_action(),
                ArgAction::SetTrue | ArgAction::SetFalse | ArgAction::Count
            );

            // A default on a switch is just the implicit false; only value
            // arguments get a vars. line.
            let default = if is_switch {
                None
            } else {
                arg.get_default_values()
                    .first()
                    .and_then(|v| v.to_str())
                    .map(|v| v.to_owned())
            };

            args.push(CommandArg {
                long,
                var,
                help,
                is_switch,
                required: arg.is_required_set(),
                default,
            });
        }

        Ok(CheckCommand {
            name: name.to_owned(),
            args,
        })
    }

    /// Renders the `object CheckCommand` block, using the running binary's
    /// own path as the command.
    pub fn to_object(&self) -> Result<String, IcingaConfigError> {
        let exe = std::env::current_exe()?
            .to_str()
            .ok_or(IcingaConfigError::InvalidExecutablePath)?
            .to_owned();

        let name = &self.name;
        let mut out = format!("object CheckCommand \"{name}\" {{\n");
        out.push_str(&format!("  command = [ \"{exe}\" ]\n"));
        out.push_str("  arguments = {\n");

        for arg in &self.args {
            out.push_str(&format!("    \"--{}\" = {{\n", arg.long));

            if arg.is_switch {
                out.push_str(&format!("      set_if = \"${}$\"\n", arg.var));
            } else {
                out.push_str(&format!("      value = \"${}$\"\n", arg.var));
            }

            if let Some(help) = &arg.help {
                out.push_str(&format!("      description = \"{}\"\n", escape(help)));
            }

            if arg.required {
                out.push_str("      required = true\n");
            }

            out.push_str("    }\n");
        }

        out.push_str("  }\n");

        let defaults: Vec<&CommandArg> = self.args.iter().filter(|a| a.default.is_some()).collect();
        if !defaults.is_empty() {
            out.push('\n');
            for arg in defaults {
                if let Some(default) = &arg.default {
                    out.push_str(&format!("  vars.{} = \"{}\"\n", arg.var, escape(default)));
                }
            }
        }

        out.push_str("}\n");
        Ok(out)
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"").replace('$', "\\$")
}

/// Prints the Icinga2 command configuration and exits when the
/// `GENERATE_ICINGA_COMMAND` environment variable is set; does nothing
/// otherwise. Meant to run before argument parsing.
pub fn print_icinga_command_config_if_env_and_exit(
    name: &str,
    var_prefix: &str,
    cmd: &clap::Command,
) -> Result<(), IcingaConfigError> {
    if std::env::var_os("GENERATE_ICINGA_COMMAND").is_none() {
        return Ok(());
    }

    let command = CheckCommand::from_clap(name, var_prefix, cmd)?;
    println!("{}", command.to_object()?.trim());
    std::process::exit(0);
}
