//! Resolves and loads the curated `ctxforge:*` host module namespace.
//! Each module is a thin JS shim over the native globals `host.rs`
//! installs (`system`, `os`, `tui`, `context`, `output`) — this keeps the
//! Rust/JS boundary to one place (the globals) while still giving scripts
//! an ergonomic `require("ctxforge:os")` surface.

use rquickjs::loader::{Loader, Resolver};
use rquickjs::{Ctx, Module};

pub struct CtxforgeResolver;

impl Resolver for CtxforgeResolver {
    fn resolve(&mut self, _ctx: &Ctx<'_>, base: &str, name: &str) -> rquickjs::Result<String> {
        if name.starts_with("ctxforge:") {
            Ok(name.to_string())
        } else if base.starts_with("ctxforge:") {
            Err(rquickjs::Error::new_resolving(base, name))
        } else {
            Ok(name.to_string())
        }
    }
}

pub struct CtxforgeLoader;

impl CtxforgeLoader {
    pub fn new() -> Self {
        Self
    }
}

impl Loader for CtxforgeLoader {
    fn load<'js>(&mut self, ctx: &Ctx<'js>, name: &str) -> rquickjs::Result<Module<'js, rquickjs::module::Declared>> {
        let source = module_source(name).ok_or_else(|| rquickjs::Error::new_loading(name))?;
        Module::declare(ctx.clone(), name, source)
    }
}

fn module_source(name: &str) -> Option<&'static str> {
    match name {
        "ctxforge:argv" => Some(
            r#"
            export function parseArgv(s) { return system.parseArgv(s); }
            export function formatArgv(v) { return system.formatArgv(v); }
            "#,
        ),
        "ctxforge:os" => Some(
            r#"
            export function openEditor(title, initial) { return os.openEditor(title, initial); }
            export function readFile(path) { return os.readFile(path); }
            export function fileExists(path) { return os.fileExists(path); }
            export function clipboardCopy(text) { return os.clipboardCopy(text); }
            "#,
        ),
        "ctxforge:nextIntegerId" => Some(
            r#"
            export default function nextIntegerId(items) {
                let max = -1;
                for (const item of items) { if (item.id > max) max = item.id; }
                return max + 1;
            }
            "#,
        ),
        "ctxforge:ctxutil" => Some(
            r#"
            export function buildContext(items, opts) {
                const notes = items.filter(i => i.type === "note").map(i => i.payload.text);
                const txtar = opts && opts.toTxtar ? opts.toTxtar() : "";
                return [...notes, txtar].filter(Boolean).join("\n\n");
            }

            export function contextManager(opts) {
                const { getItems, setItems, nextIntegerId, buildPrompt } = opts;
                return {
                    commands: {},
                    addItem(type, payload, label) {
                        const items = getItems();
                        const id = nextIntegerId(items);
                        items.push({ id, type, label: label || String(id), payload });
                        setItems(items);
                        return id;
                    },
                    parseArgv: system.parseArgv,
                    formatArgv: system.formatArgv,
                    openEditor: os.openEditor,
                    clipboardCopy: os.clipboardCopy,
                    buildPrompt,
                };
            }
            "#,
        ),
        "ctxforge:text/template" => Some(
            r#"
            export function render(templateStr, vars) {
                return __renderTemplate(templateStr, vars);
            }
            "#,
        ),
        "ctxforge:sharedStateSymbols" => Some(
            r#"
            export const contextItems = "contextItems";
            "#,
        ),
        // Optional TUI-rendering/behavior-tree bindings used only by demo
        // scripts. Core modes never import these; scripts that do get a
        // clear load-failure when the bindings aren't present, per the
        // host treating them as optional.
        "ctxforge:bt" | "ctxforge:bubbletea" | "ctxforge:lipgloss" | "ctxforge:pabt" => None,
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_modules_have_source() {
        assert!(module_source("ctxforge:argv").is_some());
        assert!(module_source("ctxforge:os").is_some());
    }

    #[test]
    fn unknown_module_has_no_source() {
        assert!(module_source("ctxforge:nonexistent").is_none());
    }
}
