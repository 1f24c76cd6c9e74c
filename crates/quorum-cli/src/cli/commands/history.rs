use super::exit_codes;
use crate::cli::args::HistoryArgs;
use quorum_core::engine::EvaluationService;
use quorum_core::model::{EvaluationFilter, RubricKind};

pub fn cmd_history(service: &EvaluationService, args: HistoryArgs) -> anyhow::Result<i32> {
    let rubric = match args.rubric.as_deref() {
        None => None,
        Some(tag) => match RubricKind::parse(tag) {
            Some(r) => Some(r),
            None => {
                eprintln!("config error: unknown rubric: {}", tag);
                return Ok(exit_codes::CONFIG_ERROR);
            }
        },
    };
    let filter = EvaluationFilter {
        template_id: args.template,
        from_date: args.from,
        to_date: args.to,
        rubric,
        min_score: args.min_score,
    };

    let page_size = args.page_size.clamp(1, 100);
    let offset = args.page.max(1).saturating_sub(1).saturating_mul(page_size);

    let store = &service.context().store;
    let items = store.list_evaluations(&filter, page_size, offset)?;
    let total = store.count_evaluations(&filter)?;

    if args.json {
        let out = serde_json::json!({
            "items": items,
            "total": total,
            "page": args.page.max(1),
            "page_size": page_size,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(exit_codes::OK);
    }

    for s in &items {
        let e = &s.evaluation;
        let avg = s
            .average_score
            .map(|a| format!("{:.3}", a))
            .unwrap_or_else(|| "-".into());
        let created = chrono::DateTime::parse_from_rfc3339(&e.created_at)
            .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|_| e.created_at.clone());
        println!(
            "{}  {}  {:<9} {:<19} {:>2} results  avg {}",
            e.id,
            created,
            e.status.as_str(),
            e.accuracy_rubric.as_str(),
            s.result_count,
            avg
        );
    }
    let pages = total.div_ceil(page_size as u64).max(1);
    eprintln!("page {} of {} ({} total)", args.page.max(1), pages, total);
    Ok(exit_codes::OK)
}
