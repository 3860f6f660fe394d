//! Static analysis of Rust source fragments.

use syn::visit::{self, Visit};
use syn::{
    BinOp, Expr, ExprBinary, ExprCall, ExprForLoop, ExprIf, ExprLoop, ExprMatch, ExprMethodCall,
    ExprTry, ExprUnsafe, ExprWhile, ImplItemFn, ItemExternCrate, ItemFn, ItemUse, Lit, TraitItemFn,
    UseTree,
};

/// Calls that load or evaluate code at runtime, or reinterpret memory.
const DYNAMIC_CALLS: &[&str] = &[
    "eval", "exec", "execv", "execve", "execvp", "dlopen", "dlsym", "transmute",
];
/// Methods that replace or re-enter the process image.
const DYNAMIC_METHODS: &[&str] = &["eval", "exec"];
/// Programs that interpret their arguments as shell code.
const SHELLS: &[&str] = &["sh", "bash", "zsh", "dash", "ksh", "cmd", "cmd.exe", "powershell", "pwsh"];
/// Flags instructing a shell to run an inline command string.
const SHELL_FLAGS: &[&str] = &["-c", "/c", "/C", "-Command"];

/// Imports flagged regardless of how they are used.
pub const RISKY_IMPORTS: &[(&str, &str)] = &[
    ("std::process", "direct process execution"),
    ("libloading", "dynamic code loading"),
    ("std::mem::transmute", "unchecked memory reinterpretation"),
    ("abomonation", "unsafe deserialization"),
    ("serde_pickle", "pickle deserialization"),
];

/// Findings of one analysis pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeReport {
    /// Cyclomatic-style complexity, starting at zero.
    pub complexity: u32,
    /// Dangerous constructs, one entry per occurrence.
    pub security_issues: Vec<String>,
    /// Every imported path, flattened.
    pub imports: Vec<String>,
    /// Imports on the denylist, with the reason.
    pub risky_imports: Vec<String>,
    /// Number of free, associated, and trait function definitions.
    pub functions: usize,
}

/// A parsed source fragment: a whole file, or a bare statement block.
pub(crate) enum Source {
    File(syn::File),
    Block(syn::Block),
}

impl Source {
    /// Parses `code` as a file, falling back to a statement block.
    ///
    /// The file parser's error is returned when neither form parses.
    pub(crate) fn parse(code: &str) -> syn::Result<Self> {
        match syn::parse_file(code) {
            Ok(file) => Ok(Self::File(file)),
            Err(file_err) => syn::parse_str(&format!("{{\n{code}\n}}"))
                .map(Self::Block)
                .map_err(|_| file_err),
        }
    }

    pub(crate) fn accept<'ast, V: Visit<'ast>>(&'ast self, visitor: &mut V) {
        match self {
            Self::File(file) => visitor.visit_file(file),
            Self::Block(block) => visitor.visit_block(block),
        }
    }
}

/// Parses `code` as a file, falling back to a statement block, and analyses it.
///
/// # Errors
///
/// Returns the file parser's error when neither form parses.
pub fn analyze(code: &str) -> syn::Result<CodeReport> {
    let source = Source::parse(code)?;
    let mut analyzer = Analyzer::default();
    source.accept(&mut analyzer);
    Ok(analyzer.finish())
}

/// Checks that `code` parses, without analysing it.
///
/// # Errors
///
/// Returns the parser error when neither a file nor a statement block parses.
pub fn parse_check(code: &str) -> syn::Result<()> {
    analyze(code).map(|_| ())
}

#[derive(Default)]
struct Analyzer {
    report: CodeReport,
    shell_spawned: bool,
}

impl Analyzer {
    fn finish(mut self) -> CodeReport {
        for import in &self.report.imports {
            for (denied, reason) in RISKY_IMPORTS {
                if import == denied || import.starts_with(&format!("{denied}::")) {
                    self.report.risky_imports.push(format!("{import} ({reason})"));
                }
            }
        }
        self.report
    }

    fn security(&mut self, finding: String) {
        self.report.security_issues.push(finding);
    }
}

impl<'ast> Visit<'ast> for Analyzer {
    fn visit_expr_if(&mut self, node: &'ast ExprIf) {
        self.report.complexity += 1;
        visit::visit_expr_if(self, node);
    }

    fn visit_expr_while(&mut self, node: &'ast ExprWhile) {
        self.report.complexity += 1;
        visit::visit_expr_while(self, node);
    }

    fn visit_expr_for_loop(&mut self, node: &'ast ExprForLoop) {
        self.report.complexity += 1;
        visit::visit_expr_for_loop(self, node);
    }

    fn visit_expr_loop(&mut self, node: &'ast ExprLoop) {
        self.report.complexity += 1;
        visit::visit_expr_loop(self, node);
    }

    fn visit_expr_match(&mut self, node: &'ast ExprMatch) {
        let branches = u32::try_from(node.arms.len().saturating_sub(1)).unwrap_or(u32::MAX);
        self.report.complexity = self.report.complexity.saturating_add(branches);
        visit::visit_expr_match(self, node);
    }

    fn visit_expr_try(&mut self, node: &'ast ExprTry) {
        self.report.complexity += 1;
        visit::visit_expr_try(self, node);
    }

    // Chains nest left-associatively, so one per operator is operands - 1.
    fn visit_expr_binary(&mut self, node: &'ast ExprBinary) {
        if matches!(node.op, BinOp::And(_) | BinOp::Or(_)) {
            self.report.complexity += 1;
        }
        visit::visit_expr_binary(self, node);
    }

    fn visit_expr_call(&mut self, node: &'ast ExprCall) {
        if let Expr::Path(func) = &*node.func {
            let path = path_string(&func.path);
            let last = func.path.segments.last().map(|s| s.ident.to_string());
            if path.ends_with("Library::new")
                || last.as_deref().is_some_and(|name| DYNAMIC_CALLS.contains(&name))
            {
                self.security(format!("dynamic execution call `{path}`"));
            }
            if is_shell_command(node) {
                self.shell_spawned = true;
            }
        }
        visit::visit_expr_call(self, node);
    }

    fn visit_expr_method_call(&mut self, node: &'ast ExprMethodCall) {
        let method = node.method.to_string();
        if DYNAMIC_METHODS.contains(&method.as_str()) {
            self.security(format!("dynamic execution method `.{method}()`"));
        }
        if matches!(method.as_str(), "arg" | "args")
            && node
                .args
                .iter()
                .flat_map(string_literals)
                .any(|lit| SHELL_FLAGS.contains(&lit.as_str()))
            && (self.shell_spawned || receiver_spawns_shell(&node.receiver))
        {
            self.security("shell command executed with an inline script flag".into());
        }
        visit::visit_expr_method_call(self, node);
    }

    fn visit_expr_unsafe(&mut self, node: &'ast ExprUnsafe) {
        self.security("unsafe block".into());
        visit::visit_expr_unsafe(self, node);
    }

    fn visit_item_use(&mut self, node: &'ast ItemUse) {
        flatten_use(&node.tree, String::new(), &mut self.report.imports);
        visit::visit_item_use(self, node);
    }

    fn visit_item_extern_crate(&mut self, node: &'ast ItemExternCrate) {
        self.report.imports.push(node.ident.to_string());
        visit::visit_item_extern_crate(self, node);
    }

    fn visit_item_fn(&mut self, node: &'ast ItemFn) {
        self.report.functions += 1;
        visit::visit_item_fn(self, node);
    }

    fn visit_impl_item_fn(&mut self, node: &'ast ImplItemFn) {
        self.report.functions += 1;
        visit::visit_impl_item_fn(self, node);
    }

    fn visit_trait_item_fn(&mut self, node: &'ast TraitItemFn) {
        self.report.functions += 1;
        visit::visit_trait_item_fn(self, node);
    }
}

fn path_string(path: &syn::Path) -> String {
    path.segments
        .iter()
        .map(|segment| segment.ident.to_string())
        .collect::<Vec<_>>()
        .join("::")
}

fn join(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_owned()
    } else {
        format!("{prefix}::{segment}")
    }
}

fn flatten_use(tree: &UseTree, prefix: String, out: &mut Vec<String>) {
    match tree {
        UseTree::Path(path) => flatten_use(&path.tree, join(&prefix, &path.ident.to_string()), out),
        UseTree::Name(name) if name.ident == "self" => out.push(prefix),
        UseTree::Name(name) => out.push(join(&prefix, &name.ident.to_string())),
        UseTree::Rename(rename) => out.push(join(&prefix, &rename.ident.to_string())),
        UseTree::Glob(_) => out.push(join(&prefix, "*")),
        UseTree::Group(group) => {
            for item in &group.items {
                flatten_use(item, prefix.clone(), out);
            }
        }
    }
}

fn string_literals(expr: &Expr) -> Vec<String> {
    match expr {
        Expr::Lit(lit) => match &lit.lit {
            Lit::Str(value) => vec![value.value()],
            _ => Vec::new(),
        },
        Expr::Array(array) => array.elems.iter().flat_map(string_literals).collect(),
        Expr::Reference(reference) => string_literals(&reference.expr),
        Expr::Macro(mac) if mac.mac.path.is_ident("vec") => mac
            .mac
            .parse_body_with(syn::punctuated::Punctuated::<Expr, syn::Token![,]>::parse_terminated)
            .map(|items| items.iter().flat_map(string_literals).collect())
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

fn is_shell_command(call: &ExprCall) -> bool {
    let Expr::Path(func) = &*call.func else {
        return false;
    };
    if !path_string(&func.path).ends_with("Command::new") {
        return false;
    }
    call.args.first().is_some_and(|program| {
        string_literals(program).iter().any(|name| {
            let program = name.rsplit(['/', '\\']).next().unwrap_or(name);
            SHELLS.contains(&program)
        })
    })
}

fn receiver_spawns_shell(mut expr: &Expr) -> bool {
    loop {
        match expr {
            Expr::MethodCall(call) => expr = &call.receiver,
            Expr::Paren(paren) => expr = &paren.expr,
            Expr::Reference(reference) => expr = &reference.expr,
            Expr::Call(call) => return is_shell_command(call),
            _ => return false,
        }
    }
}
