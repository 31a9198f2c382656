#[cfg(test)]
#[path = "slash_commands_test.rs"]
mod tests;

pub struct SlashCommand {
    command: String,
    pub args: Vec<String>,
}

impl SlashCommand {
    pub fn parse(text: &str) -> Option<SlashCommand> {
        let mut args = text
            .split_whitespace()
            .map(|e| return e.to_string())
            .collect::<Vec<String>>();
        if args.is_empty() {
            return None;
        }
        let prefix = args.remove(0);

        let cmd = SlashCommand {
            command: prefix,
            args,
        };
        if cmd.is_quit()
            || cmd.is_help()
            || cmd.is_new()
            || cmd.is_model_list()
            || cmd.is_model_set()
            || cmd.is_rename()
            || cmd.is_image()
            || cmd.is_speak()
            || cmd.is_stop()
            || cmd.is_history()
        {
            return Some(cmd);
        }

        return None;
    }

    /// Arguments joined back together, for commands taking free text.
    pub fn rest(&self) -> String {
        return self.args.join(" ");
    }

    pub fn is_quit(&self) -> bool {
        return ["/q", "/quit", "/exit"].contains(&self.command.as_str());
    }

    pub fn is_help(&self) -> bool {
        return ["/h", "/help"].contains(&self.command.as_str());
    }

    pub fn is_new(&self) -> bool {
        return ["/n", "/new"].contains(&self.command.as_str());
    }

    pub fn is_model_list(&self) -> bool {
        return ["/ml", "/models", "/modellist"].contains(&self.command.as_str());
    }

    pub fn is_model_set(&self) -> bool {
        return ["/m", "/model"].contains(&self.command.as_str());
    }

    pub fn is_rename(&self) -> bool {
        return self.command == "/rename";
    }

    pub fn is_image(&self) -> bool {
        return ["/i", "/image"].contains(&self.command.as_str());
    }

    pub fn is_speak(&self) -> bool {
        return ["/s", "/speak"].contains(&self.command.as_str());
    }

    pub fn is_stop(&self) -> bool {
        return self.command == "/stop";
    }

    pub fn is_history(&self) -> bool {
        return ["/history", "/hist"].contains(&self.command.as_str());
    }
}
