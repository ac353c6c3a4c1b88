//! Built-in native mode definitions: `code-review` and `prompt-flow`.
//!
//! Both share the same context-manager-backed command set (add/diff/
//! note/list/edit/remove/show/copy) and differ only in title/prompt.
//! Items are persisted under the mode's `items` state slot so a session
//! resumed later (or after a mode switch) sees the same context list.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::json;

use crate::context::{ContextItem, ContextManager};
use crate::modes::{Command, CommandTable, ModeConfig, StateAccessor, StateContract, StateSlot};

fn items_contract() -> (StateContract, StateSlot) {
    let mut contract = StateContract::new();
    let slot = contract.declare_slot("items", json!([]), Some("persisted context items for this mode".to_string()));
    (contract, slot)
}

fn load_items(accessor: &StateAccessor, contract: &StateContract, slot: StateSlot) -> Vec<ContextItem> {
    serde_json::from_value(accessor.get(contract, slot)).unwrap_or_default()
}

fn save_items(accessor: &StateAccessor, contract: &StateContract, slot: StateSlot, cm: &ContextManager) {
    if let Ok(value) = serde_json::to_value(cm.items()) {
        let _ = accessor.set(contract, slot, value);
    }
}

fn build_command_table(
    context: Arc<Mutex<ContextManager>>,
    accessor: StateAccessor,
    contract: Arc<StateContract>,
    slot: StateSlot,
) -> CommandTable {
    let mut table: CommandTable = HashMap::new();

    {
        let context = context.clone();
        let accessor = accessor.clone();
        let contract = contract.clone();
        table.insert(
            "add".to_string(),
            Command {
                name: "add".to_string(),
                description: "add <path>: register a file as a context item".to_string(),
                handler: Box::new(move |args| {
                    let path = args.first().ok_or_else(|| "usage: add <path>".to_string())?;
                    let mut cm = context.lock().unwrap();
                    let item = cm.add_file(path);
                    println!("added [{}] {}", item.id, item.label);
                    save_items(&accessor, &contract, slot, &cm);
                    Ok(())
                }),
            },
        );
    }

    {
        let context = context.clone();
        let accessor = accessor.clone();
        let contract = contract.clone();
        table.insert(
            "diff".to_string(),
            Command {
                name: "diff".to_string(),
                description: "diff [git-diff-args...]: register a lazy diff, materialized at build time".to_string(),
                handler: Box::new(move |args| {
                    let mut cm = context.lock().unwrap();
                    let item = cm.add_diff(args.to_vec());
                    println!("added [{}] {}", item.id, item.label);
                    save_items(&accessor, &contract, slot, &cm);
                    Ok(())
                }),
            },
        );
    }

    {
        let context = context.clone();
        let accessor = accessor.clone();
        let contract = contract.clone();
        table.insert(
            "note".to_string(),
            Command {
                name: "note".to_string(),
                description: "note <text>: add a freeform note, editable later".to_string(),
                handler: Box::new(move |args| {
                    if args.is_empty() {
                        return Err("usage: note <text>".to_string());
                    }
                    let mut cm = context.lock().unwrap();
                    let item = cm.add_note(args.join(" "));
                    println!("added [{}] {}", item.id, item.label);
                    save_items(&accessor, &contract, slot, &cm);
                    Ok(())
                }),
            },
        );
    }

    {
        let context = context.clone();
        table.insert(
            "list".to_string(),
            Command {
                name: "list".to_string(),
                description: "list: show all context items".to_string(),
                handler: Box::new(move |_args| {
                    let cm = context.lock().unwrap();
                    let lines = cm.list_display();
                    if lines.is_empty() {
                        println!("(no context items)");
                    } else {
                        for line in lines {
                            println!("{line}");
                        }
                    }
                    Ok(())
                }),
            },
        );
    }

    {
        let context = context.clone();
        table.insert(
            "show".to_string(),
            Command {
                name: "show".to_string(),
                description: "show <id>: print the full content of one item".to_string(),
                handler: Box::new(move |args| {
                    let id = parse_id(args)?;
                    let cm = context.lock().unwrap();
                    let text = cm.show(id).map_err(|e| e.to_string())?;
                    println!("{text}");
                    Ok(())
                }),
            },
        );
    }

    {
        let context = context.clone();
        let accessor = accessor.clone();
        let contract = contract.clone();
        table.insert(
            "edit".to_string(),
            Command {
                name: "edit".to_string(),
                description: "edit <id>: open a note item in $VISUAL/$EDITOR".to_string(),
                handler: Box::new(move |args| {
                    let id = parse_id(args)?;
                    let initial = {
                        let cm = context.lock().unwrap();
                        cm.show(id).map_err(|e| e.to_string())?
                    };
                    let new_text = crate::procs::open_editor(&format!("item-{id}"), &initial).map_err(|e| e.to_string())?;
                    let mut cm = context.lock().unwrap();
                    cm.edit_note(id, new_text).map_err(|e| e.to_string())?;
                    println!("updated [{id}]");
                    save_items(&accessor, &contract, slot, &cm);
                    Ok(())
                }),
            },
        );
    }

    {
        let context = context.clone();
        let accessor = accessor.clone();
        let contract = contract.clone();
        table.insert(
            "remove".to_string(),
            Command {
                name: "remove".to_string(),
                description: "remove <id>: drop an item (does not renumber survivors)".to_string(),
                handler: Box::new(move |args| {
                    let id = parse_id(args)?;
                    let mut cm = context.lock().unwrap();
                    let removed = cm.remove(id).map_err(|e| e.to_string())?;
                    println!("removed [{}] {}", removed.id, removed.label);
                    save_items(&accessor, &contract, slot, &cm);
                    Ok(())
                }),
            },
        );
    }

    {
        let context = context.clone();
        table.insert(
            "build".to_string(),
            Command {
                name: "build".to_string(),
                description: "build: assemble the prompt and print it".to_string(),
                handler: Box::new(move |_args| {
                    let cm = context.lock().unwrap();
                    let outcome = crate::context::build_prompt(cm.items());
                    println!("{}", outcome.text);
                    Ok(())
                }),
            },
        );
    }

    {
        let context = context.clone();
        table.insert(
            "copy".to_string(),
            Command {
                name: "copy".to_string(),
                description: "copy: build the prompt and copy it to the clipboard".to_string(),
                handler: Box::new(move |_args| {
                    let cm = context.lock().unwrap();
                    cm.copy(None).map_err(|e| e.to_string())?;
                    println!("copied to clipboard");
                    Ok(())
                }),
            },
        );
    }

    table
}

fn parse_id(args: &[String]) -> Result<i64, String> {
    args.first()
        .ok_or_else(|| "usage: <command> <id>".to_string())?
        .parse::<i64>()
        .map_err(|_| "id must be an integer".to_string())
}

/// Builds a native `ModeConfig` for `name`, backed by `context`. Declares
/// the `items` state slot, loads prior items on `onEnter`, and persists
/// on every mutating command (and again on `onExit` as a safety net).
pub fn build_mode(name: &str, title: &str, prompt: &str, context: Arc<Mutex<ContextManager>>) -> ModeConfig {
    let (contract, slot) = items_contract();
    let contract_for_commands = Arc::new(contract.clone());

    let context_for_enter = context.clone();
    let contract_for_enter = contract_for_commands.clone();

    let context_for_exit = context.clone();
    let contract_for_exit = contract_for_commands.clone();

    ModeConfig {
        name: name.to_string(),
        title: title.to_string(),
        prompt: prompt.to_string(),
        enable_history: true,
        history_file: None,
        contract,
        on_enter: Some(Box::new(move |accessor| {
            let items = load_items(accessor, &contract_for_enter, slot);
            *context_for_enter.lock().unwrap() = ContextManager::from_items(items);
            Ok(())
        })),
        on_exit: Some(Box::new(move |accessor| {
            let cm = context_for_exit.lock().unwrap();
            save_items(accessor, &contract_for_exit, slot, &cm);
        })),
        commands: Box::new(move |accessor| build_command_table(context.clone(), accessor, contract_for_commands.clone(), slot)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modes::ModeRegistry;
    use crate::store::MemoryStore;

    #[test]
    fn add_then_list_round_trips_through_the_registry() {
        let store = Arc::new(MemoryStore::new());
        let mut registry = ModeRegistry::new(store, "s1".to_string());
        let context = Arc::new(Mutex::new(ContextManager::new()));
        registry.register_mode(build_mode("code-review", "Code Review", "review> ", context)).unwrap();
        registry.switch_mode("code-review").unwrap();

        registry.execute_command("note", &["hello".to_string(), "world".to_string()]).unwrap();
        assert!(registry.execute_command("list", &[]).is_ok());
    }

    #[test]
    fn items_survive_a_mode_switch_and_back() {
        let store = Arc::new(MemoryStore::new());
        let mut registry = ModeRegistry::new(store.clone(), "s1".to_string());
        let context = Arc::new(Mutex::new(ContextManager::new()));
        registry.register_mode(build_mode("code-review", "Code Review", "review> ", context.clone())).unwrap();
        registry.register_mode(build_mode("prompt-flow", "Prompt Flow", "flow> ", Arc::new(Mutex::new(ContextManager::new())))).unwrap();

        registry.switch_mode("code-review").unwrap();
        registry.execute_command("note", &["keep-me".to_string()]).unwrap();
        registry.switch_mode("prompt-flow").unwrap();
        registry.switch_mode("code-review").unwrap();

        assert_eq!(context.lock().unwrap().items().len(), 1);
    }
}
