// Contact list filtering and sorting
//
// A contact is visible when it satisfies every active predicate (search text,
// category, status, department, unread-only, favorites-only and the blocked /
// archived exclusions). The surviving contacts are then stable-sorted.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::str::FromStr;

use crate::models::{Contact, ContactStatus};

/// Which tab of the chat list is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContactCategory {
    #[default]
    All,
    Direct,
    Groups,
    Favorites,
    Blocked,
    Archived,
}

impl FromStr for ContactCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(ContactCategory::All),
            "direct" | "people" => Ok(ContactCategory::Direct),
            "groups" | "group" => Ok(ContactCategory::Groups),
            "favorites" | "favourites" => Ok(ContactCategory::Favorites),
            "blocked" => Ok(ContactCategory::Blocked),
            "archived" => Ok(ContactCategory::Archived),
            other => Err(format!("unknown category '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Only(ContactStatus),
}

impl FromStr for StatusFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(StatusFilter::All);
        }
        s.parse::<ContactStatus>().map(StatusFilter::Only)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    Name,
    Status,
    /// Orders by `last_message_time`, not by the preview text
    LastMessage,
    UnreadCount,
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "name" => Ok(SortKey::Name),
            "status" => Ok(SortKey::Status),
            "lastmessage" => Ok(SortKey::LastMessage),
            "unreadcount" | "unread" => Ok(SortKey::UnreadCount),
            _ => Err(format!("unknown sort key '{}'", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortOrder::Asc),
            "desc" | "descending" => Ok(SortOrder::Desc),
            other => Err(format!("unknown sort order '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilterState {
    pub search_query: String,
    pub category: ContactCategory,
    pub status: StatusFilter,
    pub department: Option<String>,
    pub unread_only: bool,
    pub favorites_only: bool,
}

impl FilterState {
    pub fn matches(&self, contact: &Contact) -> bool {
        self.matches_category(contact)
            && self.matches_search(contact)
            && self.matches_status(contact)
            && self.matches_department(contact)
            && (!self.unread_only || contact.unread_count > 0)
            && (!self.favorites_only || contact.is_favorite)
    }

    fn matches_category(&self, contact: &Contact) -> bool {
        match self.category {
            ContactCategory::Blocked => contact.is_blocked,
            ContactCategory::Archived => contact.is_archived && !contact.is_blocked,
            other => {
                if contact.is_blocked || contact.is_archived {
                    return false;
                }
                match other {
                    ContactCategory::Direct => !contact.is_group_chat(),
                    ContactCategory::Groups => contact.is_group_chat(),
                    ContactCategory::Favorites => contact.is_favorite,
                    _ => true,
                }
            }
        }
    }

    fn matches_search(&self, contact: &Contact) -> bool {
        let query = self.search_query.trim().to_lowercase();
        if query.is_empty() {
            return true;
        }
        let hit = |field: &str| field.to_lowercase().contains(&query);
        hit(&contact.name)
            || hit(&contact.title)
            || contact.department.as_deref().map_or(false, hit)
            || contact.email.as_deref().map_or(false, hit)
    }

    fn matches_status(&self, contact: &Contact) -> bool {
        match self.status {
            StatusFilter::All => true,
            StatusFilter::Only(status) => contact.status == status,
        }
    }

    fn matches_department(&self, contact: &Contact) -> bool {
        match self.department.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(wanted) => contact
                .department
                .as_deref()
                .map_or(false, |d| d.trim().eq_ignore_ascii_case(wanted)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SortState {
    pub sort_by: SortKey,
    pub sort_order: SortOrder,
}

impl SortState {
    pub fn new(sort_by: SortKey, sort_order: SortOrder) -> Self {
        SortState { sort_by, sort_order }
    }

    /// Compare two contacts under this sort state.
    ///
    /// Descending order negates the comparison rather than reversing the sorted
    /// list, so contacts with equal keys keep their input order in both directions.
    pub fn compare(&self, a: &Contact, b: &Contact) -> Ordering {
        let ordering = match self.sort_by {
            SortKey::Name => a
                .name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.name.cmp(&b.name)),
            SortKey::Status => a.status.rank().cmp(&b.status.rank()),
            SortKey::LastMessage => a.last_message_time.cmp(&b.last_message_time),
            SortKey::UnreadCount => a.unread_count.cmp(&b.unread_count),
        };
        match self.sort_order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    }
}

/// Run the filter/sort pipeline over a contact snapshot
pub fn apply(contacts: &[Contact], filter: &FilterState, sort: &SortState) -> Vec<Contact> {
    let mut visible: Vec<Contact> = contacts
        .iter()
        .filter(|contact| filter.matches(contact))
        .cloned()
        .collect();
    // slice::sort_by is stable
    visible.sort_by(|a, b| sort.compare(a, b));
    visible
}

/// Distinct departments present in a snapshot, for the department picker
pub fn departments(contacts: &[Contact]) -> Vec<String> {
    contacts
        .iter()
        .filter_map(|c| c.department.as_deref())
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
