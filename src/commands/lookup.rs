//! `cpsync lookup` - read-only queries against the control plane

use anyhow::Result;
use controlplane::{Entity, lookup};
use declarative::{CallContext, RemoteStore};

use crate::Context;
use crate::cli::{LookupArgs, LookupCommand};
use crate::ui;

pub fn run(ctx: &Context, cmd: LookupCommand) -> Result<()> {
    match cmd {
        LookupCommand::Clusters(args) => clusters(ctx, &args),
        LookupCommand::Cluster { id, args } => {
            let entity = with_store(ctx, &args, |store, call| lookup::cluster(store, call, &id))?;
            print_entity("Cluster", &entity, args.json)
        }
        LookupCommand::Organization(args) => {
            let entity = with_store(ctx, &args, lookup::my_organization)?;
            print_entity("Organization", &entity, args.json)
        }
        LookupCommand::User { email, args } => {
            let entity = with_store(ctx, &args, |store, call| {
                lookup::user_by_email(store, call, &email)
            })?;
            print_entity("User", &entity, args.json)
        }
    }
}

fn with_store<T>(
    ctx: &Context,
    args: &LookupArgs,
    query: impl FnOnce(&dyn RemoteStore, &CallContext) -> controlplane::Result<T>,
) -> Result<T> {
    let manifest = super::load_manifest_or_default(&args.manifest)?;
    let store = super::connect(&args.connection, &manifest.provider)?;
    let call = super::call_context(ctx, &args.connection);
    let store: &dyn RemoteStore = &store;
    Ok(query(store, &call)?)
}

fn clusters(ctx: &Context, args: &LookupArgs) -> Result<()> {
    let ids = with_store(ctx, args, lookup::cluster_ids)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&ids)?);
    } else if ids.is_empty() {
        ui::info("No clusters are visible to this token");
    } else {
        for id in ids {
            println!("{id}");
        }
    }
    Ok(())
}

fn print_entity(title: &str, entity: &Entity, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(entity)?);
        return Ok(());
    }

    ui::header(&format!("{title} {}", entity.id));
    for (name, value) in &entity.attributes {
        ui::kv(name, &ui::truncate(&value.to_string(), 80));
    }
    Ok(())
}
