use crate::config::Config;
use crate::db::Store;
use crate::domain::TemplateId;

pub async fn cmd_templates_list(config: &Config, category: Option<&str>) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;

    let category_id = match category {
        Some(name) => {
            let Some(found) = store.find_category(name).await? else {
                println!("Category '{}' not found.", name);
                return Ok(());
            };
            Some(found.id)
        }
        None => None,
    };

    let templates = store.list_templates(category_id).await?;
    if templates.is_empty() {
        println!("No templates yet. Run: pricehound discover");
        return Ok(());
    }

    println!("Templates ({} total)", templates.len());
    println!("{:-<70}", "");

    for template in templates {
        let marker = if template.is_active { "✓" } else { "✗" };
        println!("{} [{}] {}", marker, template.id, template.search_url_pattern);
        println!("  Category: {} | Added: {}", template.category_id, template.created_at.format("%Y-%m-%d"));
    }

    Ok(())
}

pub async fn cmd_templates_set_active(config: &Config, id: i32, active: bool) -> anyhow::Result<()> {
    if id < 0 {
        println!("Invalid template ID: {id}");
        return Ok(());
    }

    let store = Store::new(&config.general.database_path).await?;
    if store.set_template_active(TemplateId::new(id), active).await? {
        let verb = if active { "enabled" } else { "disabled" };
        println!("Template {id} {verb}.");
    } else {
        println!("Template {id} not found.");
    }

    Ok(())
}
