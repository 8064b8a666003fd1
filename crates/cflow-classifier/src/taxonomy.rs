//! Fixed keyword taxonomies and pattern banks
use lazy_static::lazy_static;
use regex::Regex;

/// `category → tag → keywords`. Keywords are matched as whole words (or
/// whole phrases) against normalized text.
pub struct TaxonomyTag {
    pub category: &'static str,
    pub tag: &'static str,
    pub keywords: &'static [&'static str],
}

pub const TAXONOMY: &[TaxonomyTag] = &[
    // competitive
    TaxonomyTag {
        category: "competitive",
        tag: "competitor_mention",
        keywords: &["competitor", "rival", "alternative", "versus", "vs", "switched from", "compared to"],
    },
    TaxonomyTag {
        category: "competitive",
        tag: "pricing_change",
        keywords: &["price", "pricing", "discount", "cheaper", "price cut", "free tier", "per seat"],
    },
    TaxonomyTag {
        category: "competitive",
        tag: "product_launch",
        keywords: &["launch", "launched", "unveil", "unveiled", "announced", "new product", "general availability"],
    },
    TaxonomyTag {
        category: "competitive",
        tag: "partnership",
        keywords: &["partnership", "partner", "alliance", "acquisition", "acquired", "joint"],
    },
    // customer
    TaxonomyTag {
        category: "customer",
        tag: "customer_success",
        keywords: &["success", "saved", "improved", "reduced", "increased", "results", "roi", "outcome"],
    },
    TaxonomyTag {
        category: "customer",
        tag: "churn_risk",
        keywords: &["churn", "cancel", "leaving", "renewal risk", "downgrade", "unhappy", "frustrated"],
    },
    TaxonomyTag {
        category: "customer",
        tag: "expansion",
        keywords: &["expand", "expansion", "upsell", "more seats", "additional licenses", "upgrade", "rollout"],
    },
    TaxonomyTag {
        category: "customer",
        tag: "feedback",
        keywords: &["feedback", "feature request", "wish", "suggestion", "would like", "pain point"],
    },
    // product
    TaxonomyTag {
        category: "product",
        tag: "bug_fix",
        keywords: &["bug", "fix", "fixed", "crash", "error", "regression", "patch"],
    },
    TaxonomyTag {
        category: "product",
        tag: "feature",
        keywords: &["feature", "new", "added", "support for", "introduces", "capability"],
    },
    TaxonomyTag {
        category: "product",
        tag: "performance",
        keywords: &["faster", "performance", "latency", "speed", "optimized", "throughput"],
    },
    TaxonomyTag {
        category: "product",
        tag: "security",
        keywords: &["security", "vulnerability", "cve", "encryption", "sso", "audit log"],
    },
    // market
    TaxonomyTag {
        category: "market",
        tag: "industry_trend",
        keywords: &["trend", "market", "industry", "adoption", "analyst", "forecast"],
    },
    TaxonomyTag {
        category: "market",
        tag: "regulation",
        keywords: &["regulation", "gdpr", "hipaa", "regulatory", "compliance", "law"],
    },
];

/// Which fixed-weight bump a pattern bank contributes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternBank {
    Urgency,
    Impact,
    PositiveSentiment,
    NegativeSentiment,
}

impl PatternBank {
    pub const ALL: [PatternBank; 4] = [
        PatternBank::Urgency,
        PatternBank::Impact,
        PatternBank::PositiveSentiment,
        PatternBank::NegativeSentiment,
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            Self::Urgency => "urgent",
            Self::Impact => "high_impact",
            Self::PositiveSentiment => "positive_sentiment",
            Self::NegativeSentiment => "negative_sentiment",
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            Self::Urgency | Self::Impact => "signal",
            Self::PositiveSentiment | Self::NegativeSentiment => "sentiment",
        }
    }

    pub fn patterns(&self) -> &'static [Regex] {
        match self {
            Self::Urgency => &URGENCY,
            Self::Impact => &IMPACT,
            Self::PositiveSentiment => &POSITIVE,
            Self::NegativeSentiment => &NEGATIVE,
        }
    }

    /// Count pattern hits in lowercased raw text
    pub fn hits(&self, lowered: &str) -> usize {
        self.patterns().iter().map(|re| re.find_iter(lowered).count()).sum()
    }
}

lazy_static! {
    static ref URGENCY: Vec<Regex> = vec![
        Regex::new(r"\burgent(ly)?\b").unwrap(),
        Regex::new(r"\basap\b").unwrap(),
        Regex::new(r"\bimmediately\b").unwrap(),
        Regex::new(r"\bright away\b").unwrap(),
        Regex::new(r"\bdeadline\b").unwrap(),
        Regex::new(r"\bescalat(e|ed|ion)\b").unwrap(),
    ];

    static ref IMPACT: Vec<Regex> = vec![
        Regex::new(r"\d+(\.\d+)?\s?%").unwrap(),
        Regex::new(r"\b\d+(\.\d+)?x\b").unwrap(),
        Regex::new(r"\b(revenue|roi|cost savings?)\b").unwrap(),
        Regex::new(r"\b(significant(ly)?|dramatic(ally)?|game[- ]chang(ing|er)|transformative)\b").unwrap(),
    ];

    static ref POSITIVE: Vec<Regex> = vec![
        Regex::new(r"\b(love[sd]?|great|excellent|happy|delighted|impressed|fantastic)\b").unwrap(),
        Regex::new(r"\b(highly recommend|game changer|exceeded expectations)\b").unwrap(),
    ];

    static ref NEGATIVE: Vec<Regex> = vec![
        Regex::new(r"\b(frustrat(ed|ing)|disappoint(ed|ing)|angry|unhappy|terrible|awful|useless)\b").unwrap(),
        Regex::new(r"\b(broken|churn(ed|ing)?|cancel(l?ed|l?ing)?)\b").unwrap(),
    ];
}
