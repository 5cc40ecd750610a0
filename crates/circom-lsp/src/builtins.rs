//! Static hover documentation for circom builtins.

/// One documented language builtin.
pub struct Builtin {
    pub keyword: &'static str,
    pub prefix: &'static str,
    pub description: &'static str,
    /// Security note shown alongside the description, empty when none.
    pub security: &'static str,
}

pub const BUILTINS: &[Builtin] = &[
    Builtin {
        keyword: "pragma",
        prefix: "pragma custom_templates",
        description: "Instruction to indicate the usage of custom templates.",
        security: "",
    },
    Builtin {
        keyword: "assert",
        prefix: "assert",
        description: "Check the condition at construction time.",
        security: "",
    },
    Builtin {
        keyword: "component",
        prefix: "component ",
        description: "Instantiate a template.",
        security: "",
    },
    Builtin {
        keyword: "template",
        prefix: "template ",
        description: "Define a new circuit.",
        security: "",
    },
    Builtin {
        keyword: "signal",
        prefix: "signal ",
        description: "Declare a new signal.",
        security: "",
    },
    Builtin {
        keyword: "input",
        prefix: "input ",
        description: "Declare the signal as input.",
        security: "",
    },
    Builtin {
        keyword: "output",
        prefix: "output ",
        description: "Declare the signal as output.",
        security: "",
    },
    Builtin {
        keyword: "public",
        prefix: "public ",
        description: "Declare the signal as public.",
        security: "",
    },
    Builtin {
        keyword: "parallel",
        prefix: "parallel ",
        description: "To generate C code with the parallel component or template.",
        security: "",
    },
];

/// Looks up the hover entry for one keyword.
pub fn lookup(word: &str) -> Option<&'static Builtin> {
    BUILTINS.iter().find(|b| b.keyword == word)
}

/// Renders one builtin as hover markdown.
pub fn format_hover_markdown(builtin: &Builtin) -> String {
    let mut markdown = format!("**`{}`**\n\n{}", builtin.prefix.trim_end(), builtin.description);
    if !builtin.security.is_empty() {
        markdown.push_str("\n\n⚠️ ");
        markdown.push_str(builtin.security);
    }
    markdown
}
