use minijinja::context;

use crate::invoice::Invoice;

const INVOICE_TEMPLATE: &str = include_str!("../templates/invoice.html");

/// Lines printed per page before the table continues on the next one.
const LINES_PER_PAGE: usize = 18;

/// Prefix an already rounded amount with the rupee sign.
fn money(value: String) -> String {
    format!("\u{20b9}{value}")
}

pub fn setup_template_env() -> Result<minijinja::Environment<'static>, minijinja::Error> {
    let mut env = minijinja::Environment::new();
    env.add_template("invoice.html", INVOICE_TEMPLATE)?;
    env.add_filter("money", money);
    Ok(env)
}

/// Render the stored invoice. Amounts come from the invoice's stored totals and are only
/// formatted here.
pub fn render_template(
    env: &minijinja::Environment<'static>,
    invoice: &Invoice,
) -> Result<String, minijinja::Error> {
    let template = env.get_template("invoice.html")?;
    let mut pages: Vec<_> = invoice.lines().chunks(LINES_PER_PAGE).collect();
    if pages.is_empty() {
        pages.push(&[]);
    }
    template.render(context! {
        pages => pages,
        invoice => invoice
    })
}
