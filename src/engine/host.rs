//! Installs the host globals scripts see: `ctx`, `output`, `tui`,
//! `context`, `system`, `splitDiff`, plus host-provided data globals
//! (`args`, `config`, template strings, `defaultMaxDiffLines`).
//!
//! Most callbacks that need to reach into the rest of the host (context-
//! item mutation, state-contract bookkeeping) are boxed closures operating
//! on `serde_json::Value` ([`JsonCallback`]) rather than raw `rquickjs`
//! types, so this module is the only place that has to think about the
//! JS/Rust boundary. `tui.registerMode`/`registerCommand`/
//! `createPromptBuilder` are the exception: they receive live JS function
//! values from the script, so they're installed as bespoke `Function`s
//! that persist those values (`rquickjs::Persistent`) for later re-entry
//! rather than flattening them through `JsonCallback`.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use rquickjs::{Context, Ctx, Function, Object, Persistent, Value as JsValue};
use serde_json::{Map, Value};

use crate::context::{ContextManager, ItemPayload};
use crate::modes::{Command, CommandTable, ModeConfig, ModeRegistry, StateAccessor, StateContract};
use crate::txtar::{build_txtar, TxtarFile};

pub type JsonCallback = Box<dyn Fn(Value) -> Result<Value, String> + Send + Sync>;

/// Converts a host-side error message into a JS exception raised in `ctx`.
fn throw_error(ctx: &Ctx<'_>, message: &str) -> rquickjs::Error {
    match rquickjs::Exception::from_message(ctx.clone(), message) {
        Ok(exc) => ctx.throw(exc.into_value()),
        Err(e) => e,
    }
}

/// Bundles the callbacks `tui.*` delegates to the mode & state manager
/// (C6). `registerMode`/`registerCommand`/`createPromptBuilder` are
/// installed directly in [`install`] against `registry` (they need a live
/// `Ctx` to persist JS function values); the rest are plain data
/// operations, expressed as [`JsonCallback`]s closing over `registry`.
pub struct TuiCallbacks {
    pub registry: Arc<Mutex<ModeRegistry>>,
    pub contracts: Arc<Mutex<HashMap<String, StateContract>>>,
    pub switch_mode: JsonCallback,
    pub create_state: JsonCallback,
    pub create_state_contract: JsonCallback,
}

impl TuiCallbacks {
    /// A registry nobody else holds a handle to — `tui.*` calls still do
    /// real work, they just don't share state with anything else.
    pub fn noop() -> Self {
        let registry = Arc::new(Mutex::new(ModeRegistry::new(
            Arc::new(crate::store::MemoryStore::new()),
            "noop".to_string(),
        )));
        Self::wired(registry)
    }

    /// Wires `tui.*` to a real, shared [`ModeRegistry`].
    pub fn wired(registry: Arc<Mutex<ModeRegistry>>) -> Self {
        let contracts: Arc<Mutex<HashMap<String, StateContract>>> = Arc::new(Mutex::new(HashMap::new()));

        let switch_registry = registry.clone();
        let switch_mode: JsonCallback = Box::new(move |input| {
            let name = input
                .as_str()
                .ok_or_else(|| "switchMode: expected a mode name string".to_string())?
                .to_string();
            switch_registry.lock().unwrap().switch_mode(&name).map_err(|e| e.to_string())?;
            Ok(Value::Null)
        });

        let create_state_contracts = contracts.clone();
        let create_state: JsonCallback = Box::new(move |input| declare_contract(&create_state_contracts, input));

        let create_state_contract_contracts = contracts.clone();
        let create_state_contract: JsonCallback = Box::new(move |input| declare_contract(&create_state_contract_contracts, input));

        Self {
            registry,
            contracts,
            switch_mode,
            create_state,
            create_state_contract,
        }
    }
}

/// Shared by `tui.createState(modeName, defs)` and
/// `tui.createStateContract(modeName, defs)` — this host treats the
/// "legacy string-keyed" and "newer opaque-token" shapes identically,
/// since slots are always addressed by name across the JS boundary here.
/// `input` is `[modeName, {slotName: {description, defaultValue}}]`.
fn declare_contract(contracts: &Arc<Mutex<HashMap<String, StateContract>>>, input: Value) -> Result<Value, String> {
    let arr = input.as_array().ok_or_else(|| "expected (modeName, slotDefs)".to_string())?;
    let mode_name = arr
        .first()
        .and_then(Value::as_str)
        .ok_or_else(|| "expected a mode name string".to_string())?
        .to_string();
    let defs = arr.get(1).cloned().unwrap_or_else(|| Value::Object(Map::new()));

    let contract = contract_from_defs(&defs);
    let tokens: Map<String, Value> = contract_slot_names(&defs);
    contracts.lock().unwrap().insert(mode_name, contract);
    Ok(Value::Object(tokens))
}

fn contract_from_defs(defs: &Value) -> StateContract {
    let mut contract = StateContract::new();
    if let Some(obj) = defs.as_object() {
        for (slot_name, def) in obj {
            let default = def
                .get("defaultValue")
                .or_else(|| def.get("default"))
                .cloned()
                .unwrap_or(Value::Null);
            contract.declare_slot_legacy(slot_name.clone(), default);
        }
    }
    contract
}

fn contract_slot_names(defs: &Value) -> Map<String, Value> {
    let mut tokens = Map::new();
    if let Some(obj) = defs.as_object() {
        for slot_name in obj.keys() {
            tokens.insert(slot_name.clone(), Value::String(slot_name.clone()));
        }
    }
    tokens
}

/// Bundles the callbacks `context.*` delegates to the context manager (C4).
pub struct ContextCallbacks {
    pub add_path: JsonCallback,
    pub remove_path: JsonCallback,
    pub to_txtar: JsonCallback,
}

impl ContextCallbacks {
    pub fn noop() -> Self {
        Self {
            add_path: Box::new(|_| Ok(Value::Null)),
            remove_path: Box::new(|_| Ok(Value::Null)),
            to_txtar: Box::new(|_| Ok(Value::String(String::new()))),
        }
    }

    /// Wires `context.*` to a real, shared [`ContextManager`].
    pub fn wired(context: Arc<Mutex<ContextManager>>) -> Self {
        let add_context = context.clone();
        let add_path: JsonCallback = Box::new(move |input| {
            let path = input.as_str().ok_or_else(|| "addPath: expected a string path".to_string())?;
            let mut cm = add_context.lock().unwrap();
            let item = cm.add_file(path);
            Ok(serde_json::json!({ "id": item.id, "label": item.label }))
        });

        let remove_context = context.clone();
        let remove_path: JsonCallback = Box::new(move |input| {
            let path = input.as_str().ok_or_else(|| "removePath: expected a string path".to_string())?;
            let canonical = std::fs::canonicalize(path)
                .map(|p| p.to_string_lossy().to_string())
                .unwrap_or_else(|_| path.to_string());
            let mut cm = remove_context.lock().unwrap();
            let id = cm.items().iter().find_map(|item| match &item.payload {
                ItemPayload::File { path: p } if *p == canonical => Some(item.id),
                _ => None,
            });
            match id {
                Some(id) => {
                    cm.remove(id).map_err(|e| e.to_string())?;
                    Ok(Value::Null)
                }
                None => Err(format!("no such context path: {path}")),
            }
        });

        let txtar_context = context.clone();
        let to_txtar: JsonCallback = Box::new(move |_| {
            let cm = txtar_context.lock().unwrap();
            let files: Vec<(String, String)> = cm
                .items()
                .iter()
                .filter_map(|item| match &item.payload {
                    ItemPayload::File { path } => {
                        let content = std::fs::read_to_string(path).unwrap_or_else(|_| format!("(missing: {path})"));
                        Some((item.label.clone(), content))
                    }
                    _ => None,
                })
                .collect();
            let refs: Vec<TxtarFile<'_>> = files.iter().map(|(p, c)| TxtarFile { path: p, content: c }).collect();
            Ok(Value::String(build_txtar(&refs)))
        });

        Self {
            add_path,
            remove_path,
            to_txtar,
        }
    }
}

/// Everything a [`crate::engine::ScriptEngine`] needs from the rest of the
/// host before it can run a script.
pub struct HostEnvironment {
    pub test_mode: bool,
    pub print: Box<dyn Fn(&str) + Send + Sync>,
    pub tui: TuiCallbacks,
    pub context: ContextCallbacks,
    pub args: Vec<String>,
    pub config: Value,
    pub default_max_diff_lines: i64,
    pub templates: Map<String, Value>,
}

impl HostEnvironment {
    /// A `HostEnvironment` wired up just enough to execute simple scripts
    /// in tests: `output.print` goes to the given sink, `tui.*`/`context.*`
    /// operate against a registry/context manager nothing else can see.
    pub fn minimal_for_test(print: Box<dyn Fn(&str) + Send + Sync>) -> Self {
        Self {
            test_mode: true,
            print,
            tui: TuiCallbacks::noop(),
            context: ContextCallbacks::noop(),
            args: Vec::new(),
            config: Value::Object(Map::new()),
            default_max_diff_lines: crate::diffsplit::DEFAULT_MAX_LINES as i64,
            templates: Map::new(),
        }
    }

    /// A `HostEnvironment` whose `tui.*`/`context.*` globals mutate the
    /// given, caller-owned registry/context manager — used by `ctxforge
    /// script`/`ctxforge goal` so a script's mode registration and context
    /// edits are real rather than disconnected no-ops.
    pub fn wired(
        print: Box<dyn Fn(&str) + Send + Sync>,
        registry: Arc<Mutex<ModeRegistry>>,
        context: Arc<Mutex<ContextManager>>,
    ) -> Self {
        Self {
            test_mode: false,
            print,
            tui: TuiCallbacks::wired(registry),
            context: ContextCallbacks::wired(context),
            args: Vec::new(),
            config: Value::Object(Map::new()),
            default_max_diff_lines: crate::diffsplit::DEFAULT_MAX_LINES as i64,
            templates: Map::new(),
        }
    }
}

pub fn install(ctx: &Ctx<'_>, host: HostEnvironment, engine_context: Context) -> rquickjs::Result<()> {
    let globals = ctx.globals();

    let print = std::sync::Arc::new(host.print);
    let test_mode = host.test_mode;

    // `ctx.run(name, fn)`
    let ctx_obj = Object::new(ctx.clone())?;
    let print_for_run = print.clone();
    let run_fn = Function::new(ctx.clone(), move |name: String, f: Function| -> rquickjs::Result<()> {
        let result = f.call::<(), ()>(());
        if test_mode {
            match &result {
                Ok(()) => (print_for_run)(&format!("Sub-test {name} passed")),
                Err(_) => (print_for_run)(&format!("Sub-test {name} failed")),
            }
        }
        result
    })?;
    ctx_obj.set("run", run_fn)?;
    globals.set("ctx", ctx_obj)?;

    // `output.print(line)`
    let output_obj = Object::new(ctx.clone())?;
    let print_for_output = print.clone();
    let print_fn = Function::new(ctx.clone(), move |line: String| {
        (print_for_output)(&line);
    })?;
    output_obj.set("print", print_fn)?;
    globals.set("output", output_obj)?;

    // `tui.*`
    let tui_obj = Object::new(ctx.clone())?;
    install_register_mode(ctx, &tui_obj, host.tui.registry.clone(), host.tui.contracts.clone(), engine_context.clone())?;
    install_register_command(ctx, &tui_obj, host.tui.registry.clone(), engine_context.clone())?;
    install_json_callback(ctx, &tui_obj, "switchMode", host.tui.switch_mode)?;
    install_json_callback2(ctx, &tui_obj, "createState", host.tui.create_state)?;
    install_json_callback2(ctx, &tui_obj, "createStateContract", host.tui.create_state_contract)?;
    install_create_prompt_builder(ctx, &tui_obj)?;
    globals.set("tui", tui_obj)?;

    // `context.*`
    let context_obj = Object::new(ctx.clone())?;
    install_json_callback(ctx, &context_obj, "addPath", host.context.add_path)?;
    install_json_callback(ctx, &context_obj, "removePath", host.context.remove_path)?;
    install_json_callback(ctx, &context_obj, "toTxtar", host.context.to_txtar)?;
    globals.set("context", context_obj)?;

    // `system.parseArgv`
    let system_obj = Object::new(ctx.clone())?;
    let parse_argv_fn = Function::new(ctx.clone(), |input: String| -> Vec<String> {
        crate::argv::parse_argv(&input)
    })?;
    system_obj.set("parseArgv", parse_argv_fn)?;
    let format_argv_fn = Function::new(ctx.clone(), |tokens: Vec<String>| -> String {
        crate::argv::format_argv(&tokens)
    })?;
    system_obj.set("formatArgv", format_argv_fn)?;
    globals.set("system", system_obj)?;

    // `os.*` — backs the `ctxforge:os` host module.
    let os_obj = Object::new(ctx.clone())?;
    let open_editor_fn = Function::new(
        ctx.clone(),
        |inner_ctx: Ctx<'_>, label: String, initial: String| -> rquickjs::Result<String> {
            crate::procs::open_editor(&label, &initial).map_err(|e| throw_error(&inner_ctx, &e.to_string()))
        },
    )?;
    os_obj.set("openEditor", open_editor_fn)?;

    let read_file_fn = Function::new(ctx.clone(), |inner_ctx: Ctx<'_>, path: String| -> rquickjs::Result<JsValue<'_>> {
        let result = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::json!({ "content": content, "error": Value::Null }),
            Err(e) => serde_json::json!({ "content": "", "error": e.to_string() }),
        };
        json_to_js(&inner_ctx, &result)
    })?;
    os_obj.set("readFile", read_file_fn)?;

    let file_exists_fn = Function::new(ctx.clone(), |path: String| -> bool { std::path::Path::new(&path).exists() })?;
    os_obj.set("fileExists", file_exists_fn)?;

    let clipboard_copy_fn = Function::new(
        ctx.clone(),
        |inner_ctx: Ctx<'_>, text: String| -> rquickjs::Result<()> {
            crate::procs::clipboard_copy(&text, None).map_err(|e| throw_error(&inner_ctx, &e.to_string()))
        },
    )?;
    os_obj.set("clipboardCopy", clipboard_copy_fn)?;
    globals.set("os", os_obj)?;

    // `__renderTemplate(templateStr, vars)` — backs `ctxforge:text/template`.
    let render_template_fn = Function::new(
        ctx.clone(),
        |inner_ctx: Ctx<'_>, template_str: String, vars: JsValue<'_>| -> rquickjs::Result<String> {
            let vars_json = js_to_json(&vars)?;
            super::template::render_template(&template_str, &vars_json)
                .map_err(|e| throw_error(&inner_ctx, &e.to_string()))
        },
    )?;
    globals.set("__renderTemplate", render_template_fn)?;

    // `splitDiff(diff, maxLines)`
    let split_diff_fn = Function::new(
        ctx.clone(),
        |inner_ctx: Ctx<'_>, diff: String, max_lines: i64| -> rquickjs::Result<JsValue<'_>> {
            let chunks = crate::diffsplit::split_diff(&diff, max_lines);
            let json = serde_json::to_value(
                chunks
                    .into_iter()
                    .map(|c| {
                        serde_json::json!({
                            "index": c.index,
                            "total": c.total,
                            "files": c.files,
                            "content": c.content,
                            "lines": c.lines,
                        })
                    })
                    .collect::<Vec<_>>(),
            )
            .unwrap_or(Value::Array(Vec::new()));
            json_to_js(&inner_ctx, &json)
        },
    )?;
    globals.set("splitDiff", split_diff_fn)?;

    // Host-provided data globals.
    globals.set("args", host.args)?;
    globals.set("config", json_to_js(ctx, &host.config)?)?;
    globals.set("defaultMaxDiffLines", host.default_max_diff_lines)?;
    for (key, value) in host.templates.iter() {
        globals.set(key.as_str(), json_to_js(ctx, value)?)?;
    }

    Ok(())
}

fn install_json_callback(ctx: &Ctx<'_>, object: &Object<'_>, name: &str, callback: JsonCallback) -> rquickjs::Result<()> {
    let callback = std::sync::Arc::new(callback);
    let func = Function::new(ctx.clone(), move |inner_ctx: Ctx<'_>, input: JsValue| -> rquickjs::Result<JsValue> {
        let json_in = js_to_json(&input)?;
        match (callback)(json_in) {
            Ok(out) => json_to_js(&inner_ctx, &out),
            Err(message) => Err(throw_error(&inner_ctx, &message)),
        }
    })?;
    object.set(name, func)
}

/// Like [`install_json_callback`] but for two-argument calls (`createState`,
/// `createStateContract`) — the callback sees `[arg0, arg1]`.
fn install_json_callback2(ctx: &Ctx<'_>, object: &Object<'_>, name: &str, callback: JsonCallback) -> rquickjs::Result<()> {
    let callback = std::sync::Arc::new(callback);
    let func = Function::new(
        ctx.clone(),
        move |inner_ctx: Ctx<'_>, a: JsValue, b: JsValue| -> rquickjs::Result<JsValue> {
            let json_in = Value::Array(vec![js_to_json(&a)?, js_to_json(&b)?]);
            match (callback)(json_in) {
                Ok(out) => json_to_js(&inner_ctx, &out),
                Err(message) => Err(throw_error(&inner_ctx, &message)),
            }
        },
    )?;
    object.set(name, func)
}

/// Builds the `state` argument passed to a JS-registered mode's `onEnter`/
/// `onExit`/`commands` callbacks: a plain `{get(slot), set(slot, value)}`
/// object bound to this activation's accessor and contract.
fn make_state_accessor_object<'js>(
    ctx: &Ctx<'js>,
    contract: StateContract,
    accessor: StateAccessor,
) -> rquickjs::Result<Object<'js>> {
    let obj = Object::new(ctx.clone())?;

    let get_contract = contract.clone();
    let get_accessor = accessor.clone();
    let get_fn = Function::new(ctx.clone(), move |inner_ctx: Ctx<'_>, slot_name: String| -> rquickjs::Result<JsValue<'_>> {
        let value = match get_contract.slot_by_name(&slot_name) {
            Some(slot) => get_accessor.get(&get_contract, slot),
            None => Value::Null,
        };
        json_to_js(&inner_ctx, &value)
    })?;
    obj.set("get", get_fn)?;

    let set_contract = contract;
    let set_accessor = accessor;
    let set_fn = Function::new(
        ctx.clone(),
        move |inner_ctx: Ctx<'_>, slot_name: String, value: JsValue<'_>| -> rquickjs::Result<()> {
            let json_value = js_to_json(&value)?;
            if let Some(slot) = set_contract.slot_by_name(&slot_name) {
                set_accessor
                    .set(&set_contract, slot, json_value)
                    .map_err(|e| throw_error(&inner_ctx, &e.to_string()))?;
            }
            Ok(())
        },
    )?;
    obj.set("set", set_fn)?;

    Ok(obj)
}

/// Converts a JS object produced by a `commands` builder (`{cmdName:
/// {description, handler}, ...}`) into a native [`CommandTable`], persisting
/// each `handler` so it can be re-invoked later through `engine_context`.
fn command_table_from_js(ctx: &Ctx<'_>, table_obj: &Object<'_>, engine_context: &Context) -> rquickjs::Result<CommandTable> {
    let mut table = CommandTable::new();
    for key in table_obj.keys::<String>() {
        let key = key?;
        let entry: Object = table_obj.get(&key)?;
        let description: String = entry.get("description").unwrap_or_default();
        let handler_fn: Function = entry.get("handler")?;
        let command = command_from_handler(ctx, key.clone(), description, handler_fn, engine_context.clone())?;
        table.insert(key, command);
    }
    Ok(table)
}

/// Persists `handler_fn` and wraps it as a native [`Command`] that restores
/// and calls it (with the argv as a JS array of strings) on invocation.
fn command_from_handler(
    ctx: &Ctx<'_>,
    name: String,
    description: String,
    handler_fn: Function<'_>,
    engine_context: Context,
) -> rquickjs::Result<Command> {
    let persisted: Persistent<Function<'static>> = Persistent::save(ctx.clone(), handler_fn);
    Ok(Command {
        name,
        description,
        handler: Box::new(move |args: &[String]| -> Result<(), String> {
            let args = args.to_vec();
            let persisted = persisted.clone();
            engine_context.with(|call_ctx| -> Result<(), String> {
                let f: Function = persisted.clone().restore(call_ctx.clone()).map_err(|e| e.to_string())?;
                f.call::<_, ()>((args.clone(),)).map_err(|e| e.to_string())
            })
        }),
    })
}

fn install_register_mode(
    ctx: &Ctx<'_>,
    tui_obj: &Object<'_>,
    registry: Arc<Mutex<ModeRegistry>>,
    contracts: Arc<Mutex<HashMap<String, StateContract>>>,
    engine_context: Context,
) -> rquickjs::Result<()> {
    let func = Function::new(ctx.clone(), move |inner_ctx: Ctx<'_>, cfg: Object<'_>| -> rquickjs::Result<()> {
        let name: String = cfg.get("name")?;

        let tui_meta: Value = match cfg.get::<_, Option<JsValue>>("tui")? {
            Some(v) => js_to_json(&v)?,
            None => Value::Null,
        };
        let title = tui_meta.get("title").and_then(Value::as_str).unwrap_or(&name).to_string();
        let prompt = tui_meta.get("prompt").and_then(Value::as_str).unwrap_or("> ").to_string();
        let enable_history = tui_meta.get("enableHistory").and_then(Value::as_bool).unwrap_or(false);
        let history_file = tui_meta.get("historyFile").and_then(Value::as_str).map(String::from);

        let contract = {
            let mut contracts = contracts.lock().unwrap();
            match contracts.get(&name) {
                Some(existing) => existing.clone(),
                None => {
                    let defs = match cfg.get::<_, Option<JsValue>>("stateContract")? {
                        Some(v) => js_to_json(&v)?,
                        None => Value::Null,
                    };
                    let built = contract_from_defs(&defs);
                    contracts.insert(name.clone(), built.clone());
                    built
                }
            }
        };

        let on_enter_fn: Option<Function> = cfg.get("onEnter")?;
        let on_exit_fn: Option<Function> = cfg.get("onExit")?;
        let commands_fn: Function = cfg.get("commands")?;

        let on_enter_contract = contract.clone();
        let on_enter_context = engine_context.clone();
        let on_enter: Option<Box<dyn Fn(&StateAccessor) -> Result<(), String> + Send + Sync>> = on_enter_fn.map(|f| {
            let persisted: Persistent<Function<'static>> = Persistent::save(inner_ctx.clone(), f);
            Box::new(move |accessor: &StateAccessor| -> Result<(), String> {
                let accessor = accessor.clone();
                let contract = on_enter_contract.clone();
                let persisted = persisted.clone();
                on_enter_context.with(|call_ctx| -> Result<(), String> {
                    let f: Function = persisted.clone().restore(call_ctx.clone()).map_err(|e| e.to_string())?;
                    let state_obj = make_state_accessor_object(&call_ctx, contract, accessor).map_err(|e| e.to_string())?;
                    f.call::<_, ()>((state_obj,)).map_err(|e| e.to_string())
                })
            }) as Box<dyn Fn(&StateAccessor) -> Result<(), String> + Send + Sync>
        });

        let on_exit_contract = contract.clone();
        let on_exit_context = engine_context.clone();
        let on_exit: Option<Box<dyn Fn(&StateAccessor) + Send + Sync>> = on_exit_fn.map(|f| {
            let persisted: Persistent<Function<'static>> = Persistent::save(inner_ctx.clone(), f);
            Box::new(move |accessor: &StateAccessor| {
                let accessor = accessor.clone();
                let contract = on_exit_contract.clone();
                let persisted = persisted.clone();
                let result = on_exit_context.with(|call_ctx| -> rquickjs::Result<()> {
                    let f: Function = persisted.clone().restore(call_ctx.clone())?;
                    let state_obj = make_state_accessor_object(&call_ctx, contract, accessor)?;
                    f.call::<_, ()>((state_obj,))
                });
                if let Err(e) = result {
                    eprintln!("onExit for a script-registered mode failed: {e}");
                }
            }) as Box<dyn Fn(&StateAccessor) + Send + Sync>
        });

        let commands_persisted: Persistent<Function<'static>> = Persistent::save(inner_ctx.clone(), commands_fn);
        let commands_contract = contract.clone();
        let commands_context = engine_context.clone();
        let commands = Box::new(move |accessor: StateAccessor| -> CommandTable {
            let contract = commands_contract.clone();
            let persisted = commands_persisted.clone();
            let result = commands_context.with(|call_ctx| -> rquickjs::Result<CommandTable> {
                let builder: Function = persisted.clone().restore(call_ctx.clone())?;
                let state_obj = make_state_accessor_object(&call_ctx, contract, accessor)?;
                let table_obj: Object = builder.call((state_obj,))?;
                command_table_from_js(&call_ctx, &table_obj, &commands_context)
            });
            result.unwrap_or_default()
        });

        let config = ModeConfig {
            name,
            title,
            prompt,
            enable_history,
            history_file,
            contract,
            on_enter,
            on_exit,
            commands,
        };

        registry
            .lock()
            .unwrap()
            .register_mode(config)
            .map_err(|e| throw_error(&inner_ctx, &e.to_string()))
    })?;
    tui_obj.set("registerMode", func)
}

fn install_register_command(
    ctx: &Ctx<'_>,
    tui_obj: &Object<'_>,
    registry: Arc<Mutex<ModeRegistry>>,
    engine_context: Context,
) -> rquickjs::Result<()> {
    let func = Function::new(ctx.clone(), move |inner_ctx: Ctx<'_>, cfg: Object<'_>| -> rquickjs::Result<()> {
        let name: String = cfg.get("name")?;
        let description: String = cfg.get("description").unwrap_or_default();
        let handler_fn: Function = cfg.get("handler")?;
        let command = command_from_handler(&inner_ctx, name, description, handler_fn, engine_context.clone())?;
        registry.lock().unwrap().register_command(command);
        Ok(())
    })?;
    tui_obj.set("registerCommand", func)
}

/// `tui.createPromptBuilder(name, description)` — a chainable object whose
/// `build()` renders `setTemplate`'s template against the accumulated
/// `setVariable` map via the same renderer that backs
/// `ctxforge:text/template` (`{{k}}` resolves as a bare, dot-less field
/// path, which the renderer already treats identically to `{{ .k }}`).
fn install_create_prompt_builder(ctx: &Ctx<'_>, tui_obj: &Object<'_>) -> rquickjs::Result<()> {
    let func = Function::new(
        ctx.clone(),
        |inner_ctx: Ctx<'_>, name: String, description: String| -> rquickjs::Result<Object<'_>> {
            let obj = Object::new(inner_ctx.clone())?;
            obj.set("name", name)?;
            obj.set("description", description)?;

            let template = Rc::new(RefCell::new(String::new()));
            let vars: Rc<RefCell<Map<String, Value>>> = Rc::new(RefCell::new(Map::new()));

            let set_template_store = template.clone();
            let self_for_template = obj.clone();
            let set_template_fn = Function::new(inner_ctx.clone(), move |text: String| -> Object<'_> {
                *set_template_store.borrow_mut() = text;
                self_for_template.clone()
            })?;
            obj.set("setTemplate", set_template_fn)?;

            let set_variable_vars = vars.clone();
            let self_for_variable = obj.clone();
            let set_variable_fn = Function::new(
                inner_ctx.clone(),
                move |key: String, value: JsValue<'_>| -> rquickjs::Result<Object<'_>> {
                    let json_value = js_to_json(&value)?;
                    set_variable_vars.borrow_mut().insert(key, json_value);
                    Ok(self_for_variable.clone())
                },
            )?;
            obj.set("setVariable", set_variable_fn)?;

            let build_template = template.clone();
            let build_vars = vars.clone();
            let build_fn = Function::new(inner_ctx.clone(), move |build_ctx: Ctx<'_>| -> rquickjs::Result<String> {
                let vars_value = Value::Object(build_vars.borrow().clone());
                super::template::render_template(&build_template.borrow(), &vars_value)
                    .map_err(|e| throw_error(&build_ctx, &e.to_string()))
            })?;
            obj.set("build", build_fn)?;

            Ok(obj)
        },
    )?;
    tui_obj.set("createPromptBuilder", func)
}

/// Converts a `serde_json::Value` into a live JS value in `ctx`.
pub fn json_to_js<'js>(ctx: &Ctx<'js>, value: &Value) -> rquickjs::Result<JsValue<'js>> {
    match value {
        Value::Null => Ok(JsValue::new_null(ctx.clone())),
        Value::Bool(b) => Ok(JsValue::new_bool(ctx.clone(), *b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(JsValue::new_number(ctx.clone(), i as f64))
            } else {
                Ok(JsValue::new_number(ctx.clone(), n.as_f64().unwrap_or(0.0)))
            }
        }
        Value::String(s) => {
            let js_str = rquickjs::String::from_str(ctx.clone(), s)?;
            Ok(js_str.into_value())
        }
        Value::Array(items) => {
            let arr = rquickjs::Array::new(ctx.clone())?;
            for (i, item) in items.iter().enumerate() {
                arr.set(i, json_to_js(ctx, item)?)?;
            }
            Ok(arr.into_value())
        }
        Value::Object(map) => {
            let obj = Object::new(ctx.clone())?;
            for (key, val) in map.iter() {
                obj.set(key.as_str(), json_to_js(ctx, val)?)?;
            }
            Ok(obj.into_value())
        }
    }
}

/// Converts a live JS value back into a `serde_json::Value`. Functions
/// and other non-data values become `null`.
pub fn js_to_json(value: &JsValue<'_>) -> rquickjs::Result<Value> {
    if value.is_null() || value.is_undefined() {
        return Ok(Value::Null);
    }
    if let Some(b) = value.as_bool() {
        return Ok(Value::Bool(b));
    }
    if let Some(n) = value.as_number() {
        return Ok(serde_json::json!(n));
    }
    if let Some(s) = value.as_string() {
        return Ok(Value::String(s.to_string()?));
    }
    if let Some(arr) = value.as_array() {
        let mut out = Vec::with_capacity(arr.len());
        for item in arr.iter::<JsValue>() {
            out.push(js_to_json(&item?)?);
        }
        return Ok(Value::Array(out));
    }
    if let Some(obj) = value.as_object() {
        let mut map = Map::new();
        for key in obj.keys::<String>() {
            let key = key?;
            let val: JsValue = obj.get(&key)?;
            map.insert(key, js_to_json(&val)?);
        }
        return Ok(Value::Object(map));
    }
    Ok(Value::Null)
}
