#![cfg_attr(not(feature = "std"), no_std, no_main)]

/// # Course Crowdsale
///
/// **Role:** Tuition crowdfunding with attendance-gated refunds. Students
/// contribute tuition before a deadline, the teacher runs one roll call per
/// lesson across a fixed course length, and at course end every student who
/// attended at least 80% of the lessons is refunded in full. Whatever is not
/// refunded is swept to the teacher.
///
/// **Lifecycle:**
/// ```text
///   deploy ──► contribute* ──► [open_roll_call / roll_call / close_roll_call]* ──► withdraw
///                              (repeated once per lesson, up to total_lessons)
/// ```
///
/// The contract never self-destructs: once every balance is zero and the
/// residual has been swept, further `withdraw` calls move nothing.
#[ink::contract]
mod course_crowdsale {
    use ink::prelude::string::String;
    use ink::prelude::vec::Vec;
    use ink::storage::Mapping;

    // =========================================================================
    // CONSTANTS
    // =========================================================================

    /// Base unit of the native currency. The tuition passed to the
    /// constructor is given in whole tokens and scaled by this factor.
    pub const TOKEN_UNIT: u128 = 1_000_000_000_000_000_000;

    /// Share of lessons a student must attend to qualify for a refund,
    /// in percent. The threshold is `ceil(total_lessons * 80 / 100)`.
    pub const REFUND_ATTENDANCE_PCT: u64 = 80;

    // =========================================================================
    // STORAGE
    // =========================================================================

    /// One roster entry per enrolled address, created on the first accepted
    /// contribution and never removed.
    ///
    /// `enrolled_amount` is a snapshot of the enrollment-time contribution;
    /// the `balances` mapping is the authoritative value for settlement.
    #[derive(Debug, Clone, PartialEq, Eq, scale::Encode, scale::Decode)]
    #[cfg_attr(
        feature = "std",
        derive(scale_info::TypeInfo, ink::storage::traits::StorageLayout)
    )]
    pub struct StudentRecord {
        pub address: AccountId,
        pub attendance: u32,
        pub enrolled_amount: Balance,
    }

    #[ink(storage)]
    pub struct CourseCrowdsale {
        /// Deploying caller. Collects the residual at settlement.
        teacher: AccountId,

        /// Tuition per lesson in base units. A contribution below this is
        /// rejected outright, there are no partial contributions.
        tuition: Balance,

        /// Fixed course length in lessons.
        total_lessons: u32,

        /// Lessons started so far. Advances by one each time a roll call
        /// opens and never passes `total_lessons`.
        current_lesson: u32,

        /// Block after which check-ins no longer count. Set at construction.
        deadline: BlockNumber,

        /// True only strictly between `open_roll_call` and the earlier of
        /// `close_roll_call` or lazy deadline detection in `roll_call`.
        roll_call_active: bool,

        /// Sum of all net (non-refunded) contributions.
        total_raised: Balance,

        // ── Student state ─────────────────────────────────────────────────
        /// Authoritative per-student balance.
        balances: Mapping<AccountId, Balance>,

        /// Append-only, insertion-ordered roster. The settlement sweep
        /// traverses it in this order.
        roster: Vec<StudentRecord>,

        /// Roster slot by address, so attendance lookups avoid a linear scan.
        student_index: Mapping<AccountId, u32>,

        /// Per-round check-in flag, reset when a roll call opens. A repeat
        /// check-in within one open round does not double-count.
        attended_this_round: Mapping<AccountId, bool>,
    }

    // =========================================================================
    // EVENTS
    // =========================================================================

    /// Emitted when a contribution is accepted.
    #[ink(event)]
    pub struct Registration {
        #[ink(topic)]
        student: AccountId,
        amount: Balance,
    }

    /// Emitted when the teacher opens a roll call for the next lesson.
    #[ink(event)]
    pub struct RollCallOpened {
        #[ink(topic)]
        teacher: AccountId,
        lesson: u32,
    }

    /// Emitted when the teacher closes the current roll call.
    #[ink(event)]
    pub struct RollCallClosed {
        #[ink(topic)]
        teacher: AccountId,
        lesson: u32,
    }

    /// Emitted for every refund and for the teacher's residual sweep.
    #[ink(event)]
    pub struct FundWithdrawn {
        #[ink(topic)]
        recipient: AccountId,
        amount: Balance,
    }

    // =========================================================================
    // ERRORS
    // =========================================================================

    #[derive(Debug, PartialEq, Eq, scale::Encode, scale::Decode)]
    #[cfg_attr(feature = "std", derive(scale_info::TypeInfo))]
    pub enum Error {
        /// A constructor argument violates a numeric precondition.
        InvalidArgument,
        /// A precondition of a state-mutating call failed: wrong caller,
        /// wrong course phase, or insufficient funds.
        Rejected,
        /// The caller is not enrolled where enrollment is required.
        NotFound,
    }

    // =========================================================================
    // IMPLEMENTATION
    // =========================================================================

    impl CourseCrowdsale {
        // ---------------------------------------------------------------------
        // Constructor
        // ---------------------------------------------------------------------

        /// Create a course run by the deploying caller.
        ///
        /// `tuition` is the per-lesson price in whole tokens and is scaled by
        /// [`TOKEN_UNIT`]. The deadline is the current block plus `duration`.
        /// Either computation overflowing is an `InvalidArgument`.
        #[ink(constructor)]
        pub fn new(tuition: Balance, total_lessons: u32, duration: BlockNumber) -> Result<Self, Error> {
            let tuition = tuition
                .checked_mul(TOKEN_UNIT)
                .ok_or(Error::InvalidArgument)?;
            let deadline = Self::env()
                .block_number()
                .checked_add(duration)
                .ok_or(Error::InvalidArgument)?;

            Ok(Self {
                teacher: Self::env().caller(),
                tuition,
                total_lessons,
                current_lesson: 0,
                deadline,
                roll_call_active: false,
                total_raised: 0,
                balances: Mapping::default(),
                roster: Vec::new(),
                student_index: Mapping::default(),
                attended_this_round: Mapping::default(),
            })
        }

        // =====================================================================
        // CONTRIBUTION
        // =====================================================================

        /// Contribute tuition. Anyone except the teacher may pay in while the
        /// course is still running, as long as the attached value covers at
        /// least one lesson's tuition.
        ///
        /// The first accepted contribution enrolls the caller on the roster;
        /// repeat contributions accumulate on the same entry.
        #[ink(message, payable)]
        pub fn contribute(&mut self) -> Result<(), Error> {
            if self.course_finished() {
                return Err(Error::Rejected);
            }

            let caller = self.env().caller();
            if caller == self.teacher {
                return Err(Error::Rejected);
            }

            let value = self.env().transferred_value();
            if value == 0 {
                return Err(Error::Rejected);
            }
            if value < self.tuition {
                return Err(Error::Rejected);
            }

            if self.student_index.get(caller).is_none() {
                let slot = self.roster.len() as u32;
                self.roster.push(StudentRecord {
                    address: caller,
                    attendance: 0,
                    enrolled_amount: value,
                });
                self.student_index.insert(caller, &slot);
            }

            let balance = self.balance(caller).saturating_add(value);
            self.balances.insert(caller, &balance);
            self.total_raised = self.total_raised.saturating_add(value);

            self.env().emit_event(Registration {
                student: caller,
                amount: value,
            });
            Ok(())
        }

        // =====================================================================
        // ROLL CALL
        // =====================================================================

        /// Open a roll call for the next lesson. Teacher only, and only while
        /// no roll call is active.
        ///
        /// On a finished course this idles: per-round flags are still reset
        /// but the lesson counter does not advance and no round opens.
        #[ink(message)]
        pub fn open_roll_call(&mut self) -> Result<(), Error> {
            let caller = self.env().caller();
            self.only_teacher(caller)?;
            if self.roll_call_active {
                return Err(Error::Rejected);
            }

            for record in &self.roster {
                self.attended_this_round.insert(record.address, &false);
            }

            if self.course_finished() {
                return Ok(());
            }

            self.current_lesson = self.current_lesson.saturating_add(1);
            self.roll_call_active = true;

            self.env().emit_event(RollCallOpened {
                teacher: caller,
                lesson: self.current_lesson,
            });
            Ok(())
        }

        /// Close the active roll call. Teacher only.
        #[ink(message)]
        pub fn close_roll_call(&mut self) -> Result<(), Error> {
            let caller = self.env().caller();
            self.only_teacher(caller)?;
            if !self.roll_call_active {
                return Err(Error::Rejected);
            }

            self.roll_call_active = false;

            self.env().emit_event(RollCallClosed {
                teacher: caller,
                lesson: self.current_lesson,
            });
            Ok(())
        }

        /// Student self-check-in for the current roll call.
        ///
        /// Only enrolled students may call this. Outside an open round the
        /// call is a silent no-op. The first check-in after the deadline
        /// closes the round instead of counting (lazy deadline enforcement).
        /// A second check-in within the same round is a silent no-op.
        #[ink(message)]
        pub fn roll_call(&mut self) -> Result<(), Error> {
            let caller = self.env().caller();
            let slot = self.student_index.get(caller).ok_or(Error::NotFound)? as usize;

            if !self.roll_call_active {
                return Ok(());
            }

            if self.past_deadline() {
                self.roll_call_active = false;
                return Ok(());
            }

            if self.attended_this_round.get(caller).unwrap_or(false) {
                return Ok(());
            }

            let record = &mut self.roster[slot];
            record.attendance = record.attendance.saturating_add(1);
            self.attended_this_round.insert(caller, &true);
            Ok(())
        }

        // =====================================================================
        // SETTLEMENT
        // =====================================================================

        /// Settle funds once the course is finished.
        ///
        /// The teacher sweeps the whole roster: eligible students are
        /// refunded in enrollment order, ineligible balances are forfeited,
        /// and the residual goes to the teacher. A student calls this to
        /// claim their own refund, which a later teacher sweep will not pay
        /// out a second time.
        #[ink(message)]
        pub fn withdraw(&mut self) -> Result<(), Error> {
            if !self.course_finished() {
                return Err(Error::Rejected);
            }

            let caller = self.env().caller();
            if caller == self.teacher {
                return self.settle_course();
            }

            let balance = self.balance(caller);
            if balance == 0 {
                return Err(Error::Rejected);
            }
            if !self.eligible_for_refund(caller) {
                return Err(Error::Rejected);
            }
            self.refund(caller, balance)
        }

        fn settle_course(&mut self) -> Result<(), Error> {
            for slot in 0..self.roster.len() {
                let student = self.roster[slot].address;
                if self.eligible_for_refund(student) {
                    let balance = self.balance(student);
                    self.refund(student, balance)?;
                }
                // Ineligible balances are forfeited into the residual.
                self.balances.insert(student, &0);
            }

            // A zero residual (already-settled course) elides the transfer
            // call entirely; the sweep still returns Ok.
            let residual = self.total_raised;
            self.total_raised = 0;
            if residual > 0 {
                self.env()
                    .transfer(self.teacher, residual)
                    .map_err(|_| Error::Rejected)?;
                self.env().emit_event(FundWithdrawn {
                    recipient: self.teacher,
                    amount: residual,
                });
            }
            Ok(())
        }

        /// Zero the student's balance, shrink the pot, and pay out.
        /// State is updated before the native transfer.
        fn refund(&mut self, student: AccountId, amount: Balance) -> Result<(), Error> {
            self.total_raised = self.total_raised.saturating_sub(amount);
            self.balances.insert(student, &0);
            self.env()
                .transfer(student, amount)
                .map_err(|_| Error::Rejected)?;
            self.env().emit_event(FundWithdrawn {
                recipient: student,
                amount,
            });
            Ok(())
        }

        // =====================================================================
        // ELIGIBILITY
        // =====================================================================

        /// A student qualifies for a refund with attendance at or above the
        /// ceiling threshold and a positive remaining balance. Zero recorded
        /// attendance never qualifies, which also covers the zero-threshold
        /// corner of a zero-lesson course.
        fn eligible_for_refund(&self, student: AccountId) -> bool {
            let Some(slot) = self.student_index.get(student) else {
                return false;
            };
            let attendance = self.roster[slot as usize].attendance;
            if attendance == 0 {
                return false;
            }
            attendance >= self.refund_threshold() && self.balance(student) > 0
        }

        /// Lessons a student must attend for a refund:
        /// `ceil(total_lessons * 80%)`.
        #[ink(message)]
        pub fn refund_threshold(&self) -> u32 {
            ((u64::from(self.total_lessons) * REFUND_ATTENDANCE_PCT + 99) / 100) as u32
        }

        // =====================================================================
        // VIEW FUNCTIONS
        // =====================================================================

        #[ink(message)]
        pub fn name(&self) -> String {
            String::from("Course Crowdsale")
        }

        #[ink(message)]
        pub fn description(&self) -> String {
            String::from("Tuition crowdfunding with attendance-based refunds")
        }

        #[ink(message)]
        pub fn balance_of(&self, owner: AccountId) -> Balance {
            self.balance(owner)
        }

        #[ink(message)]
        pub fn attendance_of(&self, student: AccountId) -> u32 {
            self.student_index
                .get(student)
                .map(|slot| self.roster[slot as usize].attendance)
                .unwrap_or(0)
        }

        #[ink(message)]
        pub fn current_lesson(&self) -> u32 {
            self.current_lesson
        }

        #[ink(message)]
        pub fn total_lessons(&self) -> u32 {
            self.total_lessons
        }

        #[ink(message)]
        pub fn amount_raised(&self) -> Balance {
            self.total_raised
        }

        /// Number of distinct enrolled students.
        #[ink(message)]
        pub fn student_count(&self) -> u32 {
            self.roster.len() as u32
        }

        /// Roll-call state rendered as a string: "Active" or "Inactive".
        #[ink(message)]
        pub fn roll_call_status(&self) -> String {
            if self.roll_call_active {
                String::from("Active")
            } else {
                String::from("Inactive")
            }
        }

        #[ink(message)]
        pub fn tuition(&self) -> Balance {
            self.tuition
        }

        #[ink(message)]
        pub fn deadline(&self) -> BlockNumber {
            self.deadline
        }

        #[ink(message)]
        pub fn teacher(&self) -> AccountId {
            self.teacher
        }

        // =====================================================================
        // INTERNAL
        // =====================================================================

        fn course_finished(&self) -> bool {
            self.current_lesson >= self.total_lessons
        }

        fn past_deadline(&self) -> bool {
            self.env().block_number() >= self.deadline
        }

        fn balance(&self, owner: AccountId) -> Balance {
            self.balances.get(owner).unwrap_or(0)
        }

        fn only_teacher(&self, caller: AccountId) -> Result<(), Error> {
            if caller != self.teacher {
                return Err(Error::Rejected);
            }
            Ok(())
        }
    }

    // =========================================================================
    // UNIT TESTS
    // =========================================================================

}
