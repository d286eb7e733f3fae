use tabled::Tabled;

#[derive(Tabled)]
pub struct OutcomeRow {
    #[tabled(rename = "#")]
    pub index: usize,
    pub fname: String,
    pub status: String,
    #[tabled(display = "float2")]
    pub duration_s: f64,
    pub log: String,
}

fn float2(n: &f64) -> String {
    format!("{:.2}", n)
}
