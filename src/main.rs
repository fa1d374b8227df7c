// ==========================================
// 在线课程后台 - 命令行入口
// ==========================================
// 用法:
//   elearn-backoffice [db_path] <command> [args...]
//
// 命令:
//   init                                   初始化数据库结构
//   modules                                列出可见模块
//   list <module_id>                       按位置列出模块内容
//   reorder <module_id> <moves.json>       批量重排 (MoveRequest 数组)
//   move <kind> <class_id> <module_id> <position>
//                                          迁移单个课时
//   purge-scratch                          清理遗留的空临时模块
//   config [key value]                     查看/写入配置
//
// db_path 省略时使用 ELEARN_BACKOFFICE_DB_PATH 或用户数据目录
// ==========================================

use anyhow::{anyhow, bail, Context, Result};
use elearn_backoffice::app::{get_default_db_path, AppState};
use elearn_backoffice::domain::{ClassKind, ClassRef, EditContext, MoveRequest};
use elearn_backoffice::logging;
use serde::Serialize;

const COMMANDS: &[&str] = &[
    "init",
    "modules",
    "list",
    "reorder",
    "move",
    "purge-scratch",
    "config",
];

fn main() -> Result<()> {
    logging::init();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        print_usage();
        return Ok(());
    }

    let db_path = if COMMANDS.contains(&args[0].as_str()) {
        get_default_db_path()
    } else {
        args.remove(0)
    };
    let command = args
        .first()
        .cloned()
        .ok_or_else(|| anyhow!("缺少命令"))?;
    let rest = &args[1..];

    tracing::info!("==================================================");
    tracing::info!("{} v{}", elearn_backoffice::APP_NAME, elearn_backoffice::VERSION);
    tracing::info!("使用数据库: {}", db_path);
    tracing::info!("==================================================");

    let state = AppState::new(db_path).map_err(|e| anyhow!(e))?;
    let ctx = EditContext::new(std::env::var("ELEARN_BACKOFFICE_ACTOR").unwrap_or_else(|_| "cli".to_string()));

    match command.as_str() {
        "init" => {
            println!("数据库已初始化: {}", state.db_path);
        }
        "modules" => {
            print_json(&state.content_api.list_modules()?)?;
        }
        "list" => {
            let module_id = parse_i64(rest.first(), "module_id")?;
            print_json(&state.content_api.list_module(&ctx, module_id)?)?;
        }
        "reorder" => {
            let module_id = parse_i64(rest.first(), "module_id")?;
            let path = rest.get(1).ok_or_else(|| anyhow!("缺少 moves.json 路径"))?;
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("无法读取移动请求文件: {}", path))?;
            let moves: Vec<MoveRequest> =
                serde_json::from_str(&raw).with_context(|| format!("移动请求格式错误: {}", path))?;

            let report = state.content_api.reorder_module(&ctx, module_id, &moves)?;
            print_json(&report)?;
        }
        "move" => {
            let kind: ClassKind = rest
                .first()
                .ok_or_else(|| anyhow!("缺少课时类型"))?
                .parse()
                .map_err(|e: String| anyhow!(e))?;
            let class_id = parse_i64(rest.get(1), "class_id")?;
            let module_id = parse_i64(rest.get(2), "module_id")?;
            let position = parse_i64(rest.get(3), "position")?;

            let outcome = state.content_api.move_class(
                &ctx,
                ClassRef::new(kind, class_id),
                module_id,
                position,
            )?;
            print_json(&outcome)?;
        }
        "purge-scratch" => {
            let removed = state.content_api.purge_scratch_modules(&ctx)?;
            println!("已清理临时模块: {}", removed);
        }
        "config" => match (rest.first(), rest.get(1)) {
            (Some(key), Some(value)) => {
                state.config_manager.set_config_value(key, value)?;
                println!("{} = {}", key, value);
            }
            (None, None) => println!("{}", state.config_manager.get_config_snapshot()?),
            _ => bail!("用法: config <key> <value>"),
        },
        other => {
            print_usage();
            bail!("未知命令: {}", other);
        }
    }

    Ok(())
}

fn parse_i64(arg: Option<&String>, name: &str) -> Result<i64> {
    let raw = arg.ok_or_else(|| anyhow!("缺少参数 {}", name))?;
    raw.trim()
        .parse::<i64>()
        .with_context(|| format!("参数 {} 不是整数: {}", name, raw))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_usage() {
    eprintln!("用法: elearn-backoffice [db_path] <command> [args...]");
    eprintln!("命令: {}", COMMANDS.join(", "));
}
