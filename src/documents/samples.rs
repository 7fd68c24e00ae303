// Seed corpus for demos and smoke tests

use super::{DocumentType, Metadata, MetadataValue, keys};

#[derive(Debug, Clone, Copy)]
pub struct SampleDocument {
    pub doc_id: &'static str,
    pub document_type: DocumentType,
    pub project: &'static str,
    pub won: Option<bool>,
    pub content: &'static str,
}

impl SampleDocument {
    /// Caller metadata to index this sample with
    #[inline]
    pub fn metadata(&self) -> Metadata {
        let mut metadata = Metadata::new();
        metadata.insert(keys::DOC_ID.to_string(), self.doc_id.into());
        metadata.insert("project".to_string(), self.project.into());
        if let Some(won) = self.won {
            metadata.insert("won".to_string(), MetadataValue::Bool(won));
        }
        metadata
    }
}

pub const SAMPLE_DOCUMENTS: [SampleDocument; 5] = [
    SampleDocument {
        doc_id: "rfq_dubai_marina_001",
        document_type: DocumentType::Rfq,
        project: "Dubai Marina",
        won: None,
        content: "REQUEST FOR QUOTATION - Commercial Building Construction

Project: Dubai Marina Tower Complex
Location: Dubai Marina, Dubai, UAE
Project ID: PRJ-001

Scope of Work:
- Construction of 45-story mixed-use tower
- Total built-up area: 850,000 sq ft
- Residential units, retail spaces and parking
- High-end finishes with premium materials
- LEED Gold certification required

Technical Requirements:
- Foundation: piled foundation with basement levels
- Structure: reinforced concrete frame with steel elements
- Facade: curtain wall system with energy-efficient glazing
- MEP: full HVAC, electrical, plumbing and fire safety systems

Timeline: 24 months from mobilization
Budget Range: $10M - $15M
Submission Deadline: January 15, 2026",
    },
    SampleDocument {
        doc_id: "rfq_highway_002",
        document_type: DocumentType::Rfq,
        project: "Highway Extension",
        won: None,
        content: "REQUEST FOR PROPOSAL - Infrastructure Project

Project: Abu Dhabi Highway Extension
Location: Abu Dhabi, UAE
Project ID: PRJ-002

Scope of Work:
- Extension of existing highway network (15 km)
- 6-lane expressway with emergency lanes
- 3 major interchanges with ramps
- Street lighting and road signage
- Drainage and utilities relocation

Technical Requirements:
- Asphalt concrete pavement design
- Bridge construction for 2 overpasses
- Traffic management during construction
- Environmental impact mitigation

Timeline: 18 months
Budget Range: $25M - $30M
Submission Deadline: February 1, 2026",
    },
    SampleDocument {
        doc_id: "rfq_stadium_004",
        document_type: DocumentType::Rfq,
        project: "Qatar Stadium",
        won: None,
        content: "REQUEST FOR QUOTATION - Sports Facility

Project: Qatar Sports Stadium
Location: Doha, Qatar
Project ID: PRJ-004

Scope of Work:
- Multi-purpose stadium with 25,000 seating capacity
- Olympic-standard track and field facilities
- Indoor sports complex with basketball and volleyball courts
- VIP lounges and premium seating areas
- Audiovisual systems

Technical Requirements:
- Retractable roof structure
- Climate-controlled environment
- Acoustics and lighting
- Accessible facilities for disabled persons

Timeline: 30 months
Budget Range: $45M - $55M
Submission Deadline: January 30, 2026",
    },
    SampleDocument {
        doc_id: "bid_luxury_tower_win",
        document_type: DocumentType::Bid,
        project: "Luxury Tower",
        won: Some(true),
        content: "WINNING BID PROPOSAL - Luxury Residential Tower

Executive Summary:
We submit this proposal for the construction of the premium residential tower.
With 20+ years of high-rise construction across the GCC region, we deliver
luxury projects on time and within budget.

Technical Approach:
- BIM (Building Information Modeling) for coordination
- Just-in-time material delivery to optimize site logistics
- Prefabricated components for faster construction
- ISO 9001 quality management system

Project Team:
- Project Manager: 15+ years in high-rise construction
- Site Engineer: LEED AP certified
- Safety Manager: OSHA 30-hour certified
- Quality Control: Six Sigma Black Belt

Timeline: 22 months (2 months ahead of schedule)
Total Investment: $12.5M (within budget)

Risk Mitigation:
- Comprehensive insurance coverage
- Weather contingency planning
- Supply chain backup vendors
- Weekly progress reporting",
    },
    SampleDocument {
        doc_id: "bid_highway_proposal",
        document_type: DocumentType::Bid,
        project: "Highway",
        won: Some(true),
        content: "PROPOSAL - Highway Infrastructure Development

Company Qualifications:
We have completed over 200 km of highway projects across the UAE and GCC region,
including the Dubai-Al Ain Highway expansion (2023), the Sharjah Ring Road
development (2022) and the Abu Dhabi Coastal Road improvements (2021).

Technical Methodology:
1. Survey and Planning (Weeks 1-4): topographical survey, geotechnical
   investigation, utility mapping and coordination.
2. Earthworks and Foundation (Months 2-6): site clearing and grading, drainage
   installation, subgrade preparation.
3. Pavement Construction (Months 7-14): base course, asphalt concrete paving,
   quality testing at each layer.
4. Finishing Works (Months 15-18): road markings and signage, lighting,
   landscaping.

Safety and Environment:
- Zero-accident safety program
- Dust suppression and noise control
- Traffic management plan

Proposed Investment: $27.8M
Timeline: 17 months (1 month ahead of schedule)",
    },
];
