//! Static landing-page content.

use super::model::{LandingContent, Service, SiteStats, Testimonial};

static SERVICES: &[Service] = &[
    Service {
        id: "llc-formation",
        title: "LLC Formation",
        description: "Complete LLC registration with state filing and registered agent service",
        price: "$299",
        features: &[
            "State filing fees included",
            "Registered agent (1 year)",
            "Operating agreement template",
            "EIN application assistance",
            "Digital document delivery",
        ],
        popular: false,
    },
    Service {
        id: "corporation-formation",
        title: "Corporation Formation",
        description: "Full corporation setup with bylaws and stock certificates",
        price: "$399",
        features: &[
            "Articles of incorporation",
            "Corporate bylaws",
            "Stock certificates",
            "Registered agent (1 year)",
            "EIN application",
            "Corporate kit",
        ],
        popular: true,
    },
    Service {
        id: "ein-service",
        title: "EIN Service",
        description: "Fast EIN (Tax ID) number acquisition for your business",
        price: "$99",
        features: &[
            "Same-day processing",
            "IRS direct filing",
            "Digital EIN letter",
            "Tax account setup",
            "Customer support",
        ],
        popular: false,
    },
    Service {
        id: "bank-account",
        title: "US Bank Account",
        description: "Open a US business bank account remotely",
        price: "$199",
        features: &[
            "Remote account opening",
            "No US visit required",
            "Multiple bank options",
            "Debit card included",
            "Online banking setup",
        ],
        popular: false,
    },
];

static TESTIMONIALS: &[Testimonial] = &[
    Testimonial {
        id: "1",
        name: "Sarah Chen",
        company: "TechFlow Solutions",
        country: "Singapore",
        content: "Bizservo made it incredibly easy to start my US company. The entire process was completed in just 3 days, and their support team was amazing.",
        rating: 5,
    },
    Testimonial {
        id: "2",
        name: "Marcus Rodriguez",
        company: "Global Ventures LLC",
        country: "Mexico",
        content: "I was skeptical about forming a US company online, but Bizservo exceeded my expectations. Professional, fast, and transparent pricing.",
        rating: 5,
    },
    Testimonial {
        id: "3",
        name: "Priya Patel",
        company: "Innovation Labs",
        country: "India",
        content: "The bank account opening service was a game-changer. I can now accept US payments without any hassle. Highly recommended!",
        rating: 5,
    },
];

/// Everything the landing page shows.
pub fn landing() -> LandingContent {
    LandingContent {
        services: SERVICES,
        testimonials: TESTIMONIALS,
        stats: SiteStats {
            companies_formed: "10,000+",
            countries: "150+",
            avg_time: "3 days",
            success_rate: "99.8%",
        },
    }
}
