//! Report assembly: one self-contained HTML document with the question, the
//! SQL, the result table, both chart payloads, and the analysis text, plus
//! the base64 data-URI download link the UI layer hands to the user.

use crate::artifacts::CHARTS_UNAVAILABLE;
use crate::charts::Chart;
use crate::util::html_escape;
use crate::warehouse::TableData;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

pub const REPORT_FILENAME: &str = "report.html";

pub struct ReportInput<'a> {
    pub question: &'a str,
    pub sql: &'a str,
    pub table: &'a TableData,
    pub charts: Option<&'a (Chart, Chart)>,
    pub analysis: &'a str,
}

/// Render the full report document. Charts embed as Vega-Lite payloads;
/// the analysis is converted from Markdown.
pub fn render_html(input: &ReportInput<'_>) -> String {
    let charts_html = match input.charts {
        Some((a, b)) => format!(
            r#"<div id="chart1" class="chart"></div>
<div id="chart2" class="chart"></div>
<script>
vegaEmbed('#chart1', {spec1});
vegaEmbed('#chart2', {spec2});
</script>"#,
            spec1 = a.vega_lite,
            spec2 = b.vega_lite,
        ),
        None => format!("<p>{}</p>", html_escape(CHARTS_UNAVAILABLE)),
    };

    let analysis_html = markdown_to_html(input.analysis);

    format!(
        r#"<html>
<head>
    <meta charset="utf-8">
    <title>AI Data Analyst Report</title>
    <script src="https://cdn.jsdelivr.net/npm/vega@5"></script>
    <script src="https://cdn.jsdelivr.net/npm/vega-lite@5"></script>
    <script src="https://cdn.jsdelivr.net/npm/vega-embed@6"></script>
    <style>
        body {{
            font-family: sans-serif;
            background-color: #F0F1F2;
            color: #0D0D0D;
            margin: 40px;
        }}
        pre, code {{ font-family: monospace; }}
        .report-title {{ font-size: 2.5em; font-weight: bold; margin-top: 40px; }}
        .horizontal-rule {{ border: 0; height: 2px; background: #03A688; margin: 20px 0; }}
        .collapsible {{
            background-color: #03A688;
            color: white;
            cursor: pointer;
            padding: 10px;
            width: 100%;
            border: none;
            text-align: left;
            font-size: 18px;
            font-weight: bold;
        }}
        .content {{ padding: 0 18px; display: none; background-color: #f9f9f9; }}
        .content.show {{ display: block; }}
        .chart {{ width: 100%; margin: 10px 0; }}
        table {{ border-collapse: collapse; }}
        th, td {{ border: 1px solid #ccc; padding: 4px 8px; }}
    </style>
</head>
<body>
    <h1 class="report-title">AI Data Analyst Report</h1>
    <hr class="horizontal-rule">
    <button type="button" class="collapsible active">Business Question</button>
    <div class="content show">
        <p>{question}</p>
    </div>
    <hr class="horizontal-rule">
    <button type="button" class="collapsible">Analysis Code</button>
    <div class="content">
        <pre>{sql}</pre>
    </div>
    <hr class="horizontal-rule">
    <button type="button" class="collapsible">Results</button>
    <div class="content">
        {table}
    </div>
    <hr class="horizontal-rule">
    <button type="button" class="collapsible active">Charts</button>
    <div class="content show">
        {charts}
    </div>
    <hr class="horizontal-rule">
    <button type="button" class="collapsible active">Business Analysis</button>
    <div class="content show">
        {analysis}
    </div>
    <script>
        var coll = document.getElementsByClassName("collapsible");
        for (var i = 0; i < coll.length; i++) {{
            coll[i].addEventListener("click", function() {{
                this.classList.toggle("active");
                var content = this.nextElementSibling;
                if (content.style.display === "block" || content.classList.contains("show")) {{
                    content.style.display = "none";
                    content.classList.remove("show");
                }} else {{
                    content.style.display = "block";
                    content.classList.add("show");
                }}
            }});
        }}
    </script>
</body>
</html>
"#,
        question = html_escape(input.question),
        sql = html_escape(input.sql),
        table = input.table.to_html(),
        charts = charts_html,
        analysis = analysis_html,
    )
}

/// Wrap the document in a data-URI anchor with the fixed report filename.
pub fn download_link(html: &str, filename: &str) -> String {
    let b64 = BASE64.encode(html.as_bytes());
    format!("<a href=\"data:text/html;base64,{b64}\" download=\"{filename}\">Download this report</a>")
}

fn markdown_to_html(text: &str) -> String {
    let parser = pulldown_cmark::Parser::new(text);
    let mut out = String::new();
    pulldown_cmark::html::push_html(&mut out, parser);
    out
}
