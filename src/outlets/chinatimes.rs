//! chinatimes.com adapter.
//!
//! Articles live in a dense per-day numeric ID space:
//!
//! ```text
//! https://www.chinatimes.com/realtimenews/{yyyymmdd}{seq:06}-{api}?chdtv
//! ```
//!
//! with sequences handed out from zero each day across the whole site, so
//! the ID-space walker probes slots instead of reading listings. The dedup
//! key is the `{yyyymmdd}{seq:06}` stem alone; the category code is routing,
//! not identity.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};

use super::Outlet;
use crate::engine::IdSpaceOutlet;
use crate::models::Category;

/// Article URL prefix shared by every slot.
pub const COMPANY_URL: &str = "https://www.chinatimes.com/realtimenews/";

/// Category table as the outlet publishes it.
pub const CATEGORIES: &[Category] = &[
    Category { name: "政治", api: "260407" },
    Category { name: "中時社論", api: "262101" },
    Category { name: "旺報社評", api: "262102" },
    Category { name: "工商社論", api: "262113" },
    Category { name: "快評", api: "262103" },
    Category { name: "時論廣場", api: "262104" },
    Category { name: "尚青論壇", api: "262114" },
    Category { name: "兩岸徵文", api: "262106" },
    Category { name: "兩岸史話", api: "262107" },
    Category { name: "海納百川", api: "262110" },
    Category { name: "玩食", api: "260405" },
    Category { name: "消費", api: "260113" },
    Category { name: "時尚", api: "260405" },
    Category { name: "新消息", api: "262301" },
    Category { name: "華人星光", api: "262404" },
    Category { name: "哈燒日韓、西洋熱門", api: "260404" },
    Category { name: "財經", api: "260410" },
    Category { name: "國際", api: "260408" },
    Category { name: "兩岸", api: "260409" },
    Category { name: "社會", api: "260402" },
    Category { name: "軍事", api: "260417" },
    Category { name: "科技", api: "260412" },
    Category { name: "高爾夫", api: "260111" },
    Category { name: "球類", api: "260403" },
    Category { name: "萌寵", api: "260819" },
    Category { name: "搜奇", api: "260809" },
    Category { name: "歷史", api: "260812" },
    Category { name: "健康", api: "260418" },
    Category { name: "時人真話", api: "260102" },
    Category { name: "運勢", api: "260423" },
    Category { name: "寶島", api: "260421" },
];

static ARTICLE_BODY: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.article-body").unwrap());

/// ID-space adapter for chinatimes.
#[derive(Debug, Clone, Copy)]
pub struct Chinatimes;

impl IdSpaceOutlet for Chinatimes {
    fn company_id(&self) -> i64 {
        Outlet::Chinatimes.company_id()
    }

    fn article_url(&self, api: &str, day: NaiveDate, seq: u32) -> String {
        format!("{COMPANY_URL}{}{seq:06}-{api}?chdtv", day.format("%Y%m%d"))
    }

    fn url_pattern(&self, day: NaiveDate, seq: u32) -> String {
        format!("{}{seq:06}", day.format("%Y%m%d"))
    }

    /// A slot can answer 200 with an empty shell or an interstitial; only
    /// pages carrying an article body are worth keeping.
    fn inspect(&self, html: &str) -> Result<(), &'static str> {
        let document = Html::parse_document(html);
        if document.select(&ARTICLE_BODY).next().is_none() {
            return Err("article-body-missing");
        }
        Ok(())
    }
}
